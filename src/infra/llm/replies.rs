//! Canned replies used when the hosted model is unavailable.

/// Reply when no API key is configured.
pub const WELCOME_MESSAGE: &str = "Hello! I'm your AI assistant. I can help you with various tasks like answering questions, providing information, helping with coding, writing, analysis, and more. \n\nWhat would you like to know about? I'm here to help!";

const GREETING_REPLY: &str = "Hello! I'm your AI assistant. How can I help you today? I can assist with questions, provide information, help with coding, writing, analysis, and much more.";

const HELP_REPLY: &str = "I'm here to help! I can assist with:\n\n\u{2022} Answering questions and providing information\n\u{2022} Helping with programming and coding\n\u{2022} Writing assistance and content creation\n\u{2022} Data analysis and problem-solving\n\u{2022} General knowledge and explanations\n\u{2022} Creative tasks and brainstorming\n\nWhat would you like to work on?";

const CODE_REPLY: &str = "I can help you with programming! I'm knowledgeable about many programming languages and frameworks. What specific coding question do you have? I can help with:\n\n\u{2022} Syntax and best practices\n\u{2022} Debugging and problem-solving\n\u{2022} Code reviews and improvements\n\u{2022} Algorithm explanations\n\u{2022} Framework-specific questions\n\nWhat language or framework are you working with?";

const WEATHER_REPLY: &str = "I'd be happy to help with weather information! However, I don't have access to real-time weather data. For current weather conditions, I recommend checking:\n\n\u{2022} Weather apps on your device\n\u{2022} Weather websites like weather.com\n\u{2022} Local weather services\n\nIs there anything else I can help you with?";

const MATH_REPLY: &str = "I can help with mathematical questions! I can assist with:\n\n\u{2022} Basic arithmetic and calculations\n\u{2022} Algebra and equations\n\u{2022} Geometry and trigonometry\n\u{2022} Statistics and probability\n\u{2022} Mathematical concepts and explanations\n\nWhat specific math problem would you like help with?";

const WRITING_REPLY: &str = "I can help you with writing! I can assist with:\n\n\u{2022} Essay writing and structure\n\u{2022} Content creation and editing\n\u{2022} Creative writing and storytelling\n\u{2022} Business writing and emails\n\u{2022} Grammar and style improvements\n\nWhat type of writing would you like help with?";

const GREETING_WORDS: &[&str] = &["hello", "hi", "hey"];
const HELP_KEYWORDS: &[&str] = &["help", "what can you do"];
const CODE_KEYWORDS: &[&str] = &["code", "programming", "javascript", "python", "html", "css"];
const MATH_KEYWORDS: &[&str] = &["math", "calculate", "equation"];
const WRITING_KEYWORDS: &[&str] = &["write", "essay", "content", "story"];
const QUESTION_KEYWORDS: &[&str] = &["what is", "how to", "explain"];

/// Keyword-matched reply for when the model call fails.
///
/// Greetings match whole words so that "this" or "they" do not read as "hi"
/// and "hey".
pub fn fallback_reply(prompt: &str) -> String {
    let lower = prompt.trim().to_lowercase();
    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    let is_greeting = lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| GREETING_WORDS.contains(&word));

    if is_greeting {
        GREETING_REPLY.to_string()
    } else if contains_any(HELP_KEYWORDS) {
        HELP_REPLY.to_string()
    } else if contains_any(CODE_KEYWORDS) {
        CODE_REPLY.to_string()
    } else if lower.contains("weather") {
        WEATHER_REPLY.to_string()
    } else if contains_any(MATH_KEYWORDS) {
        MATH_REPLY.to_string()
    } else if contains_any(WRITING_KEYWORDS) {
        WRITING_REPLY.to_string()
    } else if contains_any(QUESTION_KEYWORDS) {
        format!(
            "I understand you're asking about \"{}\". I'm here to help with your questions and provide useful information. Could you please provide more details about what you'd like to know? I can help with explanations, step-by-step guides, and detailed information on various topics.",
            prompt
        )
    } else {
        format!(
            "I understand you're asking about \"{}\". I'm your AI assistant and I'm here to help with your questions, provide information, assist with tasks, and engage in meaningful conversations. \n\nCould you please provide more details about what you'd like to know or how I can help you? I'm knowledgeable about many topics and happy to assist!",
            prompt
        )
    }
}
