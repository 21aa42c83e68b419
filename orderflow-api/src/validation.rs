//! Order Validation
//!
//! Field-level policy applied by the save use case before anything touches
//! the store. Column bounds are the store's business; this module only
//! checks what makes an order meaningful.

use chrono::DateTime;
use once_cell::sync::Lazy;
use orderflow_core::{
    Delivery, Item, Order, Payment, ValidationError, ValidationErrors, MAX_ORDER_UID_LEN,
};
use regex::Regex;

/// E.164-like phone number: `+`, optional leading non-zero digit, 7-14 digits.
static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+[1-9]?[0-9]{7,14}$").expect("Invalid phone regex")
});

/// Dot-atom local part and hostname domain, the practical subset of RFC 5322.
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$",
    )
    .expect("Invalid email regex")
});

/// Something that can report its own violations.
pub trait Validate {
    /// Append every violation to `errs`, naming fields under `path`.
    fn collect_violations(&self, path: &str, errs: &mut ValidationErrors);

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errs = ValidationErrors::new();
        self.collect_violations("", &mut errs);
        errs.into_result()
    }
}

fn field(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

fn invalid(path: &str, name: &str, reason: &str) -> ValidationError {
    ValidationError::InvalidFieldValue {
        field: field(path, name),
        reason: reason.to_string(),
    }
}

pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && EMAIL_RE.is_match(email)
}

pub fn is_valid_rfc3339(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok()
}

impl Validate for Order {
    fn collect_violations(&self, path: &str, errs: &mut ValidationErrors) {
        if self.order_uid.trim().is_empty() {
            errs.push(ValidationError::RequiredFieldMissing {
                field: field(path, "order_uid"),
            });
        } else if self.order_uid.chars().count() > MAX_ORDER_UID_LEN {
            errs.push(ValidationError::TooLong {
                field: field(path, "order_uid"),
                max: MAX_ORDER_UID_LEN,
            });
        }

        self.delivery
            .collect_violations(&field(path, "delivery"), errs);
        self.payment.collect_violations(&field(path, "payment"), errs);

        if self.items.is_empty() {
            errs.push(invalid(path, "items", "at least one item is required"));
        }
        for (i, item) in self.items.iter().enumerate() {
            item.collect_violations(&field(path, &format!("items[{}]", i)), errs);
        }

        if !is_valid_rfc3339(&self.date_created) {
            errs.push(invalid(path, "date_created", "must be an RFC 3339 timestamp"));
        }
    }
}

impl Validate for Delivery {
    fn collect_violations(&self, path: &str, errs: &mut ValidationErrors) {
        if !is_valid_phone(&self.phone) {
            errs.push(invalid(path, "phone", "must be an E.164 phone number"));
        }
        if !is_valid_email(&self.email) {
            errs.push(invalid(path, "email", "must be a valid email address"));
        }
    }
}

impl Validate for Payment {
    fn collect_violations(&self, path: &str, errs: &mut ValidationErrors) {
        if self.amount <= 0 {
            errs.push(invalid(path, "amount", "must be greater than zero"));
        }
    }
}

impl Validate for Item {
    fn collect_violations(&self, path: &str, errs: &mut ValidationErrors) {
        if self.price <= 0 {
            errs.push(invalid(path, "price", "must be greater than zero"));
        }
    }
}
