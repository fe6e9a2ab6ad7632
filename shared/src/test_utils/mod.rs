pub mod http_test_utils;
pub mod mock_event_store;
pub mod mock_payment_store;
pub mod mock_sms;
pub mod test_logging;
