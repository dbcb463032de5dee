//! The fixed context and the system prompt template it is injected into.

use std::path::Path;

use inferlog_core::error::Error;

/// System message template; `{context}` is replaced with the run's context.
pub const SYSTEM_PROMPT_TEMPLATE: &str = "
You are a kind and humble chatbot who sticks to facts received from the
following context:
Context: {context}
";

/// Built-in context: an explainer on magic link authentication.
pub const DEFAULT_CONTEXT: &str = "
Magic link authentication is a passwordless user authentication method that
sends a single-use link to the user's email address (or, less commonly, via SMS)
to verify their identity. When the user clicks on the link, they are
automatically (“magically”) logged in to the application (or there may be
additional login steps that follow).

It can be used by itself for a potentially fully passwordless experience, for
cases in which it provides an adequate level of security. More commonly though,
it is used for multi-factor authentication (MFA), for example on top of
password-based authentication, providing an additional layer of security. In
terms of MFA, magic links are considered a “something the user has” factor since
it proves the user has access to their email account - the presumption being
that they are the only ones with access.

As a form of authentication, magic link authentication provides gatekeeping,
enhanced data security, and reduced abuse to your app. Having robust
authentication bolsters the security of your application, builds trust with
users by demonstrating a commitment to protecting their data, helps to safeguard
your reputation, and can facilitate adherence to compliance standards. Magic
links can provide strong authentication and do so in a way that is convenient
for users. No standards govern magic link authentication. Each application can
implement it in its own unique way, resulting in various variations and
approaches and a lack of interoperability.
";

/// Render the system message for `context`.
pub fn system_prompt(context: &str) -> String {
    SYSTEM_PROMPT_TEMPLATE.replacen("{context}", context, 1)
}

/// The context for this run: the file's contents if a path is given,
/// otherwise [`DEFAULT_CONTEXT`]. Read once, before any network call.
pub fn load_context(path: Option<&Path>) -> Result<String, Error> {
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("Failed to read context file {}: {e}", path.display()),
        }),
        None => Ok(DEFAULT_CONTEXT.to_string()),
    }
}
