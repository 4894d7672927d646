//! Text of the fixed onboarding questions asked by the local server.

/// Fixed question 1. Prefilled with the project directory name.
pub const NAME_QUESTION: &str = r#"Let's set up your project.

What is the project called?"#;

/// Fixed question 2. Prefilled with the README summary when one exists.
pub const DESCRIPTION_QUESTION: &str = r#"Describe the project in a sentence or two.
What should it do, and for whom?"#;

/// First stack question. Must mention "backend": the stack inference keys on it.
pub const BACKEND_QUESTION: &str = r#"Which backend technology will you use?

OPTIONS:
○ Node.js (Express)
○ Python (FastAPI)
○ Go
○ Rust (Axum)
○ ❓ I don't know yet

You can also type your own answer."#;

/// Database choices are rendered into the question text as marker lines.
pub const DATABASE_QUESTION: &str = "Which database should the project use?";

pub const DATABASE_CHOICES: &[&str] = &["PostgreSQL", "MySQL", "SQLite", "MongoDB", "❓ Not sure"];

/// Frontend choices are sent as a structured payload, so the text has no markers.
pub const FRONTEND_QUESTION: &str = "Which frontend framework do you want?";

pub const FRONTEND_CHOICES: &[&str] = &[
    "React",
    "Next.js (recommended)",
    "Vue.js",
    "Svelte",
    "❓ Not sure",
];

pub const CSS_QUESTION: &str = r#"How do you want to handle styling?

SELECT:
○ Tailwind CSS
○ CSS Modules
○ Sass
○ Plain CSS
○ ❓ Not sure"#;

/// Sent after the last fixed question is answered.
pub const CLOSING_MESSAGE: &str = r#"Thanks, that covers the basics.

Tell me about any requirements you already have: features, users,
constraints. Each message becomes part of the project brief."#;

/// Sent for every free-form requirement after the fixed sequence.
pub const REQUIREMENT_ACK: &str = "Noted. Anything else?";
