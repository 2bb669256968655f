//! Windowing the message log for the model.
//!
//! Both functions return a view into the log; the log itself is never
//! touched.

use sleuth_core::message::Message;

/// The most recent `max_len` messages, in original order.
pub fn window(messages: &[Message], max_len: usize) -> &[Message] {
    let start = messages.len().saturating_sub(max_len);
    &messages[start..]
}

/// Like [`window`], but never starts with a tool result whose assistant
/// request fell outside the cut.
///
/// When the cut lands inside a batch of results, the start moves back to
/// the assistant message that made the request, so the view may exceed
/// `max_len` by that one exchange. Results with no request anywhere before
/// them are dropped.
pub fn aligned_window(messages: &[Message], max_len: usize) -> &[Message] {
    let start = messages.len().saturating_sub(max_len);
    if !messages.get(start).is_some_and(Message::is_tool_result) {
        return &messages[start..];
    }
    let request = messages[..start]
        .iter()
        .rposition(|m| !m.is_tool_result())
        .filter(|&i| messages[i].requests_tools());
    match request {
        Some(i) => &messages[i..],
        None => {
            let orphans = messages[start..]
                .iter()
                .take_while(|m| m.is_tool_result())
                .count();
            &messages[start + orphans..]
        }
    }
}
