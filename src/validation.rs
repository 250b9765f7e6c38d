//! Input validation for form payloads.
//!
//! Each function either returns the cleaned value or every field error found,
//! so a client can redisplay the whole form at once.

use rust_decimal::Decimal;

use crate::{
    dto::{
        auth::{LoginRequest, RegisterRequest},
        products::{CreateProductRequest, UpdateProductRequest},
    },
    error::FieldError,
};

pub type Validated<T> = Result<T, Vec<FieldError>>;

pub const USERNAME_MIN: usize = 2;
pub const USERNAME_MAX: usize = 20;
pub const PASSWORD_MIN: usize = 8;
pub const PRODUCT_NAME_MAX: usize = 100;
/// Upper bound for one cart line, per request and accumulated.
pub const MAX_QUANTITY: i32 = 1000;

/// Largest amount a `NUMERIC(12, 2)` column holds.
pub fn max_amount() -> Decimal {
    Decimal::new(9_999_999_999_99, 2)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
}

pub fn registration(payload: RegisterRequest) -> Validated<NewUser> {
    let mut errors = Vec::new();

    let username = payload.username.trim().to_string();
    check_username(&username, &mut errors);

    let email = payload.email.trim().to_lowercase();
    if !looks_like_email(&email) {
        errors.push(FieldError::new("email", "must be a valid email address"));
    }

    if payload.password.chars().count() < PASSWORD_MIN {
        errors.push(FieldError::new(
            "password",
            format!("must be at least {PASSWORD_MIN} characters"),
        ));
    }

    finish(errors, NewUser {
        username,
        email,
        password: payload.password,
    })
}

pub fn login(payload: LoginRequest) -> Validated<LoginRequest> {
    let mut errors = Vec::new();
    let username = payload.username.trim().to_string();
    if username.is_empty() {
        errors.push(FieldError::new("username", "is required"));
    }
    if payload.password.is_empty() {
        errors.push(FieldError::new("password", "is required"));
    }
    finish(errors, LoginRequest {
        username,
        password: payload.password,
    })
}

/// Cart quantities default to one and must be positive.
pub fn quantity(value: Option<i32>) -> Validated<i32> {
    match value.unwrap_or(1) {
        qty if qty < 1 => Err(vec![FieldError::new("quantity", "must be at least 1")]),
        qty if qty > MAX_QUANTITY => Err(vec![FieldError::new(
            "quantity",
            format!("must be at most {MAX_QUANTITY}"),
        )]),
        qty => Ok(qty),
    }
}

pub fn new_product(payload: CreateProductRequest) -> Validated<NewProduct> {
    let mut errors = Vec::new();
    let name = payload.name.trim().to_string();
    check_product_name(&name, &mut errors);
    check_price(payload.price, &mut errors);

    let description = payload
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    finish(errors, NewProduct {
        name,
        description,
        price: payload.price,
    })
}

pub fn product_update(payload: UpdateProductRequest) -> Validated<UpdateProductRequest> {
    let mut errors = Vec::new();
    let name = payload.name.map(|n| n.trim().to_string());
    if let Some(name) = &name {
        check_product_name(name, &mut errors);
    }
    if let Some(price) = payload.price {
        check_price(price, &mut errors);
    }
    finish(errors, UpdateProductRequest {
        name,
        description: payload.description,
        price: payload.price,
    })
}

fn finish<T>(errors: Vec<FieldError>, value: T) -> Validated<T> {
    if errors.is_empty() { Ok(value) } else { Err(errors) }
}

fn check_username(username: &str, errors: &mut Vec<FieldError>) {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        errors.push(FieldError::new(
            "username",
            format!("must be between {USERNAME_MIN} and {USERNAME_MAX} characters"),
        ));
    } else if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        errors.push(FieldError::new(
            "username",
            "may only contain letters, digits and underscores",
        ));
    }
}

fn check_product_name(name: &str, errors: &mut Vec<FieldError>) {
    if name.is_empty() {
        errors.push(FieldError::new("name", "is required"));
    } else if name.chars().count() > PRODUCT_NAME_MAX {
        errors.push(FieldError::new(
            "name",
            format!("must be at most {PRODUCT_NAME_MAX} characters"),
        ));
    }
}

fn check_price(price: Decimal, errors: &mut Vec<FieldError>) {
    if price < Decimal::ZERO {
        errors.push(FieldError::new("price", "must not be negative"));
    } else if price > max_amount() {
        errors.push(FieldError::new("price", format!("must be at most {}", max_amount())));
    } else if price.scale() > 2 && price != price.round_dp(2) {
        errors.push(FieldError::new("price", "must have at most two decimals"));
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn registration_normalizes_input() {
        let user = registration(register(" ferris ", " Ferris@Example.COM ", "crabcrab"))
            .expect("valid registration");
        assert_eq!(user.username, "ferris");
        assert_eq!(user.email, "ferris@example.com");
    }

    #[test]
    fn registration_reports_every_bad_field() {
        let errors = registration(register("x", "not-an-email", "short"))
            .expect_err("invalid registration");
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["username", "email", "password"]);
    }

    #[test]
    fn username_rejects_symbols() {
        let errors = registration(register("bad name!", "a@b.io", "longenough"))
            .expect_err("symbols rejected");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "username");
    }

    #[test]
    fn login_requires_both_fields() {
        let errors = login(LoginRequest {
            username: "  ".into(),
            password: String::new(),
        })
        .expect_err("empty login");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn quantity_defaults_to_one() {
        assert_eq!(quantity(None), Ok(1));
        assert_eq!(quantity(Some(3)), Ok(3));
        assert!(quantity(Some(0)).is_err());
        assert!(quantity(Some(-2)).is_err());
    }

    #[test]
    fn quantity_is_capped() {
        assert_eq!(quantity(Some(MAX_QUANTITY)), Ok(MAX_QUANTITY));
        let errors = quantity(Some(i32::MAX)).expect_err("too many");
        assert_eq!(errors[0].field, "quantity");
    }

    #[test]
    fn price_must_fit_the_money_column() {
        let huge = new_product(CreateProductRequest {
            name: "Yacht".into(),
            description: None,
            price: Decimal::new(10_000_000_000, 0),
        })
        .expect_err("too expensive");
        assert_eq!(huge[0].field, "price");
    }

    #[test]
    fn product_price_must_be_non_negative_cents() {
        let ok = new_product(CreateProductRequest {
            name: "Hoodie".into(),
            description: Some("   ".into()),
            price: Decimal::new(1999, 2),
        })
        .expect("valid product");
        assert_eq!(ok.description, None);

        let negative = new_product(CreateProductRequest {
            name: "Hoodie".into(),
            description: None,
            price: Decimal::new(-1, 0),
        });
        assert!(negative.is_err());

        let fractional = new_product(CreateProductRequest {
            name: "Hoodie".into(),
            description: None,
            price: Decimal::new(10001, 3),
        });
        assert!(fractional.is_err());
    }

    #[test]
    fn product_update_checks_only_present_fields() {
        let update = product_update(UpdateProductRequest {
            name: None,
            description: Some("new".into()),
            price: None,
        });
        assert!(update.is_ok());

        let bad = product_update(UpdateProductRequest {
            name: Some(String::new()),
            description: None,
            price: None,
        })
        .expect_err("empty name");
        assert_eq!(bad[0].field, "name");
    }
}
