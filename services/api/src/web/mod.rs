pub mod chat;
pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible to the binary that
// builds the web server router.
pub use rest::{
    chat_handler, chat_history_handler, create_payment_handler, home_handler,
    payment_notification_handler, search_mentors_handler, upload_material_handler,
};
