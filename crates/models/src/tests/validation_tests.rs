use crate::{organization, project, user};

#[test]
fn slugify_collapses_separators() {
    assert_eq!(organization::slugify("Acme Inc"), "acme-inc");
    assert_eq!(organization::slugify("  Hello,   World!! "), "hello-world");
    assert_eq!(organization::slugify("Voca__Labs--2024"), "voca-labs-2024");
}

#[test]
fn slugify_falls_back_when_nothing_usable() {
    assert_eq!(organization::slugify("!!!"), "org");
    assert_eq!(organization::slugify(""), "org");
}

#[test]
fn unique_slug_appends_epoch_millis() {
    let slug = organization::unique_slug("Acme Inc", 1_700_000_000_123);
    assert_eq!(slug, "acme-inc-1700000000123");
}

#[test]
fn email_validation() {
    assert!(user::validate_email("a@b.com").is_ok());
    assert!(user::validate_email("no-at-sign").is_err());
    assert!(user::validate_email("@b.com").is_err());
    assert!(user::validate_email("a@").is_err());
    assert!(user::validate_email("a@b@c").is_err());
}

#[test]
fn project_name_must_not_be_blank() {
    assert!(project::validate_name("Q1 Campaign").is_ok());
    assert!(project::validate_name("   ").is_err());
    assert!(project::validate_name(&"x".repeat(129)).is_err());
}
