use thiserror::Error;

use crate::config::Recipient;

/// A generated, not-yet-sent email stored as markdown.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub recipient: Recipient,
    pub subject: String,
    pub content: String,
}

// Fixed section labels of the draft file format. The parser matches sections
// by their first word, so these must stay single words.
pub const RECIPIENT_SECTION: &str = "Empfänger";
pub const SUBJECT_SECTION: &str = "Betreff";
pub const CONTENT_SECTION: &str = "Inhalt";

const RULE: &str = "---";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("draft parsing failed: missing required field ({0})")]
    MissingField(&'static str),
}

/// Serialize a draft into the markdown form that `parse_draft` accepts.
///
/// `parse_draft(&format_draft(d))` reproduces name, email, company, subject,
/// and content exactly.
pub fn format_draft(draft: &Draft) -> String {
    format!(
        "# E-Mail an {name}\n\
         ## {RECIPIENT_SECTION}\n\
         - Name: {name}\n\
         - E-Mail: {email}\n\
         - Unternehmen: {company}\n\
         ## {SUBJECT_SECTION}\n\
         {subject}\n\
         ## {CONTENT_SECTION}\n\
         {content}\n\
         {RULE}",
        name = draft.recipient.name,
        email = draft.recipient.email,
        company = draft.recipient.company,
        subject = draft.subject,
        content = draft.content,
    )
}

/// Parse a markdown draft back into a structured record.
///
/// The document splits on `##` markers into sections recognized by their
/// first word. Empty email, subject, or content is a hard failure; name and
/// company may be empty.
pub fn parse_draft(text: &str) -> Result<Draft, ParseError> {
    let mut name = String::new();
    let mut email = String::new();
    let mut company = String::new();
    let mut subject = String::new();
    let mut content = String::new();

    for section in text.split("##").map(str::trim) {
        if section.starts_with(RECIPIENT_SECTION) {
            for line in section.lines() {
                if let Some((_, value)) = line.split_once("E-Mail:") {
                    email = value.trim().to_string();
                } else if let Some((_, value)) = line.split_once("Unternehmen:") {
                    company = value.trim().to_string();
                } else if let Some((_, value)) = line.split_once("Name:") {
                    name = value.trim().to_string();
                }
            }
        } else if section.starts_with(SUBJECT_SECTION) {
            subject = section.lines().nth(1).unwrap_or("").trim().to_string();
        } else if section.starts_with(CONTENT_SECTION) {
            let body = section
                .strip_prefix(CONTENT_SECTION)
                .unwrap_or(section)
                .trim();
            content = strip_trailing_rule(body).to_string();
        }
    }

    if email.is_empty() {
        return Err(ParseError::MissingField("email"));
    }
    if subject.is_empty() {
        return Err(ParseError::MissingField("subject"));
    }
    if content.is_empty() {
        return Err(ParseError::MissingField("content"));
    }

    Ok(Draft {
        recipient: Recipient {
            name,
            email,
            company,
            gender: None,
        },
        subject,
        content,
    })
}

/// Drop the closing `---` rule that `format_draft` appends, without touching
/// a `---` that is part of the content itself.
fn strip_trailing_rule(body: &str) -> &str {
    match body.strip_suffix(RULE) {
        Some(rest) if rest.is_empty() || rest.ends_with('\n') => rest.trim_end(),
        _ => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_draft() -> Draft {
        Draft {
            recipient: Recipient {
                name: "Jonney Stars".to_string(),
                email: "info@starsmedia.com".to_string(),
                company: "Stars Media IT GmbH".to_string(),
                gender: None,
            },
            subject: "Q4 2024 Business Development".to_string(),
            content: "Hello.".to_string(),
        }
    }

    #[test]
    fn round_trip_reproduces_all_fields() {
        let draft = sample_draft();
        let parsed = parse_draft(&format_draft(&draft)).unwrap();

        assert_eq!(parsed.recipient.name, draft.recipient.name);
        assert_eq!(parsed.recipient.email, draft.recipient.email);
        assert_eq!(parsed.recipient.company, draft.recipient.company);
        assert_eq!(parsed.subject, draft.subject);
        assert_eq!(parsed.content, draft.content);
    }

    #[test]
    fn serialized_form_contains_literal_email_line() {
        let markdown = format_draft(&sample_draft());
        assert!(markdown.contains("- E-Mail: info@starsmedia.com"));

        let parsed = parse_draft(&markdown).unwrap();
        assert_eq!(parsed.recipient.email, "info@starsmedia.com");
    }

    #[test]
    fn round_trip_preserves_multiline_content() {
        let mut draft = sample_draft();
        draft.content =
            "Sehr geehrter Herr Stars,\n\nwir laden Sie herzlich ein.\n\nMit freundlichen Grüßen"
                .to_string();

        let parsed = parse_draft(&format_draft(&draft)).unwrap();
        assert_eq!(parsed.content, draft.content);
    }

    #[test]
    fn missing_email_is_a_parse_error() {
        let mut draft = sample_draft();
        draft.recipient.email = String::new();
        assert_eq!(
            parse_draft(&format_draft(&draft)),
            Err(ParseError::MissingField("email"))
        );
    }

    #[test]
    fn missing_subject_is_a_parse_error() {
        let mut draft = sample_draft();
        draft.subject = String::new();
        assert_eq!(
            parse_draft(&format_draft(&draft)),
            Err(ParseError::MissingField("subject"))
        );
    }

    #[test]
    fn missing_content_is_a_parse_error() {
        let mut draft = sample_draft();
        draft.content = String::new();
        assert_eq!(
            parse_draft(&format_draft(&draft)),
            Err(ParseError::MissingField("content"))
        );
    }

    #[test]
    fn garbage_input_fails_instead_of_defaulting() {
        assert!(parse_draft("no sections at all").is_err());
        assert!(parse_draft("").is_err());
    }

    #[test]
    fn empty_name_and_company_are_tolerated() {
        let markdown = "# E-Mail an \n\
                        ## Empfänger\n\
                        - Name: \n\
                        - E-Mail: a@b.com\n\
                        - Unternehmen: \n\
                        ## Betreff\n\
                        Subject line\n\
                        ## Inhalt\n\
                        Body.\n\
                        ---";
        let parsed = parse_draft(markdown).unwrap();
        assert_eq!(parsed.recipient.name, "");
        assert_eq!(parsed.recipient.company, "");
        assert_eq!(parsed.recipient.email, "a@b.com");
    }
}
