//! Turn a batch of tips into one narration message.

/// At most this many tips are narrated per batch; the rest are dropped.
pub const MAX_NARRATED_TIPS: usize = 3;

/// Trailing pause cue understood by the synthesizer.
const PAUSE_CUE: &str = ".....";

/// Build the spoken message for a batch.
///
/// One tip is spoken as-is, two are joined with "Also,", three or more
/// become a short enumerated list of the first three, each inserted as
/// written. The result always ends with the pause cue.
pub fn compose(tips: &[String]) -> String {
    let message = match tips {
        [] => return String::new(),
        [only] => only.clone(),
        [first, second] => format!("{first} Also, {}", second.to_lowercase()),
        [first, second, third, ..] => {
            format!("Multiple suggestions: First, {first}. Second, {second}. Finally, {third}.")
        }
    };
    with_pause_cue(message)
}

fn with_pause_cue(mut message: String) -> String {
    if message.ends_with(PAUSE_CUE) {
        return message;
    }
    if message.ends_with("...") {
        message.push_str("..");
    } else {
        message.push_str(PAUSE_CUE);
    }
    message
}
