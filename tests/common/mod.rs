use actix_web::{web, App};
use postboard_server::{configure, AppState, MemoryStore, Settings};
use std::sync::Arc;

pub fn test_state() -> AppState {
    let config = Settings::new_for_test().expect("Failed to load test config");
    AppState::with_store(config, Arc::new(MemoryStore::new()))
}

pub fn test_app(
    state: AppState,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(state))
        .configure(configure)
}
