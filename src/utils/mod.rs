pub mod lookup_cache;
