pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible to the binary that
// builds the web server router.
pub use rest::{
    chat_handler, compare_products_handler, evaluate_quality_handler,
    generate_description_handler, semantic_search_handler,
};
