use crate::feed::ChatMessage;
use crate::settings::Settings;

/// System prompt for live chat replies in the configured tone.
#[must_use]
pub fn system_prompt(settings: &Settings) -> String {
    let mut prompt = format!(
        "You are a friendly assistant replying in a YouTube live stream chat. \
         Answer in {} in one or two short sentences. \
         Never mention that you are an AI.",
        settings.language
    );
    if settings.jokes {
        prompt.push_str(" A light, good-natured joke is welcome when it fits.");
    } else {
        prompt.push_str(" Do not make jokes.");
    }
    prompt
}

/// User turn built from a chat message
#[must_use]
pub fn user_prompt(message: &ChatMessage) -> String {
    format!("{}: {}", message.author_name, message.body.trim())
}
