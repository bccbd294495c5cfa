pub mod backend_client;
pub mod dedup;
pub mod event_hub;
pub mod job_dialog;
pub mod job_registry;
pub mod node_registry;
pub mod reconciler;
pub mod replay;
pub mod selection;
pub mod static_backend;
