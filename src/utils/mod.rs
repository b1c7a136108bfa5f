pub mod archive;
pub mod image_store;
pub mod poller;
