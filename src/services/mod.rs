pub mod alert_service;
pub mod assistant_service;
pub mod auth_service;
pub mod budget_service;
pub mod codigos_service;
pub mod comparator_service;
pub mod event_service;
pub mod goal_service;
pub mod llm_client;
pub mod store_service;
pub mod transaction_service;
pub mod user_service;
