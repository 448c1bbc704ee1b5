//! Payload shape/range checks run before anything is sent to a backend.

use cardkeep_core::{CardError, CardResult};

use crate::{CardDraft, CardPatch, Contact};

pub const MAX_TITLE_LEN: usize = 120;
pub const MAX_SUBTITLE_LEN: usize = 160;
pub const MAX_CATEGORY_LEN: usize = 60;
pub const MAX_DESCRIPTION_LEN: usize = 2000;

pub fn validate_draft(draft: &CardDraft) -> CardResult<()> {
    validate_title(&draft.title)?;
    validate_len("subtitle", &draft.subtitle, MAX_SUBTITLE_LEN)?;
    validate_len("description", &draft.description, MAX_DESCRIPTION_LEN)?;
    validate_category(&draft.category)?;
    validate_contact(&draft.contact)
}

/// Validate only the fields present in the patch.
pub fn validate_patch(patch: &CardPatch) -> CardResult<()> {
    if patch.is_empty() {
        return Err(CardError::validation("patch does not change any field"));
    }
    if let Some(title) = &patch.title {
        validate_title(title)?;
    }
    if let Some(subtitle) = &patch.subtitle {
        validate_len("subtitle", subtitle, MAX_SUBTITLE_LEN)?;
    }
    if let Some(description) = &patch.description {
        validate_len("description", description, MAX_DESCRIPTION_LEN)?;
    }
    if let Some(category) = &patch.category {
        validate_category(category)?;
    }
    if let Some(contact) = &patch.contact {
        validate_contact(contact)?;
    }
    Ok(())
}

fn validate_title(title: &str) -> CardResult<()> {
    if title.trim().is_empty() {
        return Err(CardError::validation("title must not be empty"));
    }
    validate_len("title", title, MAX_TITLE_LEN)
}

fn validate_category(category: &str) -> CardResult<()> {
    if category.trim().is_empty() {
        return Err(CardError::validation("category must not be empty"));
    }
    validate_len("category", category, MAX_CATEGORY_LEN)
}

fn validate_len(field: &str, value: &str, max: usize) -> CardResult<()> {
    if value.chars().count() > max {
        return Err(CardError::validation(format!(
            "{field} is longer than {max} characters"
        )));
    }
    Ok(())
}

fn validate_contact(contact: &Contact) -> CardResult<()> {
    if let Some(email) = &contact.email {
        let valid = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'));
        if !valid {
            return Err(CardError::validation(format!("invalid email '{email}'")));
        }
    }

    if let Some(phone) = &contact.phone {
        let allowed = |c: char| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')');
        if phone.trim().is_empty() || !phone.chars().all(allowed) {
            return Err(CardError::validation(format!("invalid phone '{phone}'")));
        }
    }

    if let Some(url) = &contact.url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(CardError::validation(format!(
                "url must start with http:// or https:// (got '{url}')"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_draft_passes() {
        let mut draft = CardDraft::new("Harbor Bakery", "food");
        draft.contact = Contact {
            email: Some("hello@harbor.example".to_string()),
            phone: Some("+351 (22) 555-0101".to_string()),
            url: Some("https://harbor.example".to_string()),
        };
        assert!(validate_draft(&draft).is_ok());
    }

    #[test]
    fn blank_title_or_category_is_rejected() {
        assert!(matches!(
            validate_draft(&CardDraft::new("  ", "food")),
            Err(CardError::Validation(_))
        ));
        assert!(matches!(
            validate_draft(&CardDraft::new("Bakery", "")),
            Err(CardError::Validation(_))
        ));
    }

    #[test]
    fn overlong_title_is_rejected() {
        let draft = CardDraft::new("x".repeat(MAX_TITLE_LEN + 1), "food");
        assert!(validate_draft(&draft).is_err());
    }

    #[test]
    fn malformed_contact_is_rejected() {
        let mut draft = CardDraft::new("Bakery", "food");
        draft.contact.email = Some("not-an-email".to_string());
        assert!(validate_draft(&draft).is_err());

        draft.contact.email = None;
        draft.contact.phone = Some("call me".to_string());
        assert!(validate_draft(&draft).is_err());

        draft.contact.phone = None;
        draft.contact.url = Some("ftp://bakery.example".to_string());
        assert!(validate_draft(&draft).is_err());
    }

    #[test]
    fn patch_validates_only_present_fields() {
        assert!(validate_patch(&CardPatch::title("New name")).is_ok());
        assert!(validate_patch(&CardPatch::title("")).is_err());
        assert!(validate_patch(&CardPatch::default()).is_err());
    }
}
