//! Validate a small form whenever one of its fields changes.
//!
//! Run with `cargo run --example form_validation`.

use ripple_core::reactive::{Effect, Signal};

fn main() {
    let username = Signal::new(String::new()).with_name("username");
    let email = Signal::new(String::new()).with_name("email");
    let is_valid = Signal::new(false).with_name("is_valid");
    let message = Signal::new(String::new()).with_name("message");

    let _validate = Effect::new({
        let (username, email) = (username.clone(), email.clone());
        let (is_valid, message) = (is_valid.clone(), message.clone());
        move || {
            let (name, mail) = (username.get(), email.get());
            println!("\nvalidating username={name:?} email={mail:?}");

            let verdict = if name.chars().count() < 3 {
                Err("username must be at least 3 characters")
            } else if !mail.contains('@') {
                Err("invalid email address")
            } else {
                Ok(())
            };

            is_valid.set(verdict.is_ok());
            message.set(match verdict {
                Ok(()) => String::from("form is valid"),
                Err(reason) => reason.to_string(),
            });

            println!("  result: {}", message.get_untracked());
        }
    });

    let attempts = [
        ("al", "test@example.com"),
        ("alice", "invalid-email"),
        ("alice", "alice@example.com"),
    ];

    for (name, mail) in attempts {
        println!("\n{}", "=".repeat(50));
        username.set(name.to_string());
        email.set(mail.to_string());
        println!("form valid: {}", is_valid.get());
    }
}
