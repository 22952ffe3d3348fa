mod model_selector;

pub use model_selector::render_model_selector;
