// bookmark-modal services
// Services provide the stateless or shared pieces: payloads, reminder times, persistence, settings, strings.

pub mod bookmark_form_data;
pub mod http_persistence;
pub mod localization_engine;
#[doc(hidden)]
pub mod mock_persistence;
pub mod persistence;
pub mod reminder_time;
pub mod sanitize;
pub mod settings_engine;
