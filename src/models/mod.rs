pub mod blend_info;
pub mod blender_installation;
pub mod computer_spec;
pub mod error;
pub mod job;
pub mod message;
pub mod mode;
pub mod node;
pub mod project_file;
pub mod server_setting;
