#![allow(dead_code)]
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::web::Data;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use tokio::sync::watch;

use hrm_attendance::auth::jwt::generate_access_token;
use hrm_attendance::config::Config;
use hrm_attendance::model::{
    branch::Branch,
    employee::EmployeeProfile,
    ledger::{AttendanceLedger, ScheduleEntry, WorkSchedule},
    shift::Shift,
};
use hrm_attendance::state::AppState;
use hrm_attendance::store::{AttendanceStore, MemoryStore};

pub const SECRET: &str = "integration-secret";
pub const COMPANY: u64 = 1;
pub const EMPLOYEE: u64 = 7;
pub const COLLEAGUE: u64 = 8;
pub const BRANCH: u64 = 9;
pub const BRANCH_LAT: f64 = 23.8103;
pub const BRANCH_LNG: f64 = 90.4125;

pub const ROLE_ADMIN: u8 = 1;
pub const ROLE_HR: u8 = 2;
pub const ROLE_EMPLOYEE: u8 = 3;

/// Builds the attendance routes around a harness, the way `main` does.
macro_rules! test_app {
    ($harness:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($harness.state.clone())
                .app_data(actix_web::web::Data::new($harness.config.clone()))
                .configure(|cfg| hrm_attendance::routes::configure(cfg, &$harness.config)),
        )
        .await
    };
}

pub struct Harness {
    pub store: MemoryStore,
    pub state: Data<AppState>,
    pub config: Config,
    pub shutdown: watch::Sender<bool>,
}

fn employee(id: u64, first_name: &str) -> EmployeeProfile {
    EmployeeProfile {
        id,
        company_id: Some(COMPANY),
        branch_id: Some(BRANCH),
        first_name: first_name.to_string(),
        last_name: "Hossain".to_string(),
        device_id: Some(format!("device-{id}")),
        status: "active".to_string(),
    }
}

/// Company 1 with two employees on a 10:00-19:00 shift every day of the week.
pub async fn harness() -> Harness {
    let store = MemoryStore::new();
    store.insert_company(COMPANY);
    store.insert_employee(employee(EMPLOYEE, "Rahim"));
    store.insert_employee(employee(COLLEAGUE, "Sadia"));
    store.insert_branch(Branch {
        id: BRANCH,
        company_id: COMPANY,
        name: "Head Office".to_string(),
        lat: Some(BRANCH_LAT),
        lng: Some(BRANCH_LNG),
        radius_meters: Some(100.0),
    });
    store.insert_shift(Shift {
        id: 1,
        company_id: COMPANY,
        name: "General".to_string(),
        start: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        end: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
        punch_in_rule: None,
        punch_out_rule: None,
    });

    let days: BTreeMap<String, ScheduleEntry> = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
        .into_iter()
        .map(|day| {
            (
                day.to_string(),
                ScheduleEntry {
                    is_weekoff: false,
                    shift_id: Some(1),
                },
            )
        })
        .collect();
    for id in [EMPLOYEE, COLLEAGUE] {
        let mut ledger = AttendanceLedger::new(id, Some(COMPANY), Utc::now());
        ledger.work_schedule = WorkSchedule::Fixed(days.clone());
        store.save_ledger(&ledger).await.unwrap();
    }

    // punches are dated yesterday so lateness does not depend on the wall clock
    let config = Config {
        jwt_secret: SECRET.to_string(),
        punch_max_age_minutes: 3 * 24 * 60,
        ..Config::default()
    };
    let (shutdown, shutdown_rx) = watch::channel(false);
    let shared: Arc<dyn AttendanceStore> = Arc::new(store.clone());
    let state = Data::new(AppState::new(&config, shared, shutdown_rx).unwrap());

    Harness {
        store,
        state,
        config,
        shutdown,
    }
}

pub fn token(role: u8, employee_id: Option<u64>) -> String {
    let token = generate_access_token(100, "tester".to_string(), role, employee_id, SECRET, 3600)
        .unwrap();
    format!("Bearer {token}")
}

pub fn peer() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

/// Yesterday at the given UTC wall-clock time; always in the past.
pub fn yesterday_at(hour: u32, minute: u32) -> DateTime<Utc> {
    (Utc::now().date_naive() - Duration::days(1))
        .and_hms_opt(hour, minute, 0)
        .unwrap()
        .and_utc()
}

/// Latitude `meters` due north of `lat`.
pub fn north_of(lat: f64, meters: f64) -> f64 {
    lat + (meters / 6_371_000.0).to_degrees()
}
