/// Everything the session shows the user.
///
/// Implementations must be cheap and non-blocking; countdown callbacks call
/// into the view from their own tasks.
pub trait ChatView: Send + Sync {
    fn show_user_message(&self, text: &str);
    fn show_bot_message(&self, text: &str);
    fn show_error(&self, message: &str);

    /// Quota notice shown when the relay reports exhaustion.
    fn show_quota_notice(&self, message: &str);

    fn show_typing(&self);
    fn hide_typing(&self);

    fn set_input_enabled(&self, enabled: bool);

    /// Short per-request countdown.
    fn show_retry_countdown(&self, seconds_left: u64);
    fn clear_retry_countdown(&self);

    /// Long daily quota countdown, already formatted as `HH:MM:SS`.
    fn show_quota_timer(&self, remaining: &str);
    fn hide_quota_timer(&self);
}
