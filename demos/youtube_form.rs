//! YouTube channel registration form
//!
//! Drives a form the way a UI would: typed input events, a conditionally
//! disabled field, a dynamic phone number list, a simulated remote email
//! availability check and submission.
//!
//! Run with:
//! ```bash
//! FORMWORK_LOG_LEVEL=debug cargo run --example youtube_form
//! ```

use formwork::prelude::*;
use std::convert::Infallible;
use std::time::Duration;

fn schema() -> FormResult<FormSchema> {
    FormSchema::builder()
        .field(Field::text("username").required("Username is required"))
        .field(
            Field::text("email")
                .rule(validators::email("Invalid email format"))
                .validate(
                    "notAdmin",
                    validators::NotEqual::new("admin@example.com")
                        .message("Enter a different email address"),
                )
                .validate(
                    "notBlackListed",
                    validators::NotEndsWith::new("baddomain.com")
                        .message("This domain is not supported"),
                )
                .validate_async("emailAvailable", |value: FieldValue, _| async move {
                    // Stand-in for a remote lookup
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    if value.to_string() == "Sincere@april.biz" {
                        Err("Email already exists".to_string())
                    } else {
                        Ok(())
                    }
                }),
        )
        .field(Field::text("channel").required("Channel is required"))
        .field(
            Field::text("social.twitter")
                .required("Twitter account is required")
                .disabled_when(|values| values.get("channel").is_none_or(FieldValue::is_empty)),
        )
        .field(Field::text("social.facebook"))
        .array(FieldArrayDef::new("phNumbers").item(Field::text("number")))
        .field(Field::number("age").default_value(0).required("Age is required"))
        .field(
            Field::date("dob")
                .default_value(chrono::Local::now().date_naive())
                .required("Date of birth is required"),
        )
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    formwork_log::init();

    let config = FormConfig::builder().mode(ValidationMode::OnBlur).build()?;
    let store = FormStore::with_config(schema()?, config);

    let _watcher = store.watch(&["username"], |change| {
        println!("username is now {:?}", change.values.get("username"));
    })?;

    println!("=== Input ===");
    store.change("username", "neo")?;
    store.blur("username")?;
    store.change("email", "Sincere@april.biz")?;
    store.blur("email")?;
    println!("email validating: {}", store.is_validating());
    store.engine().settle().await;
    println!("email error: {:?}", store.errors().message("email"));

    store.change("email", "neo@example.com")?;
    store.blur("email")?;
    store.engine().settle().await;

    println!(
        "twitter disabled: {}",
        store.field_state("social.twitter")?.is_disabled
    );
    store.change("channel", "codevolution")?;
    store.change("social.twitter", "@neo")?;
    store.change("age", "29")?;
    store.change("dob", "1996-05-14")?;

    println!("\n=== Phone numbers ===");
    let phones = store.field_array("phNumbers")?;
    store.change("phNumbers.0.number", "555-0100")?;
    phones.append(FormValues::new().with("number", "555-0101")?)?;
    phones.append(FormValues::new())?;
    phones.remove(2)?;
    for entry in phones.fields() {
        println!("  [{}] {} {}", entry.index, entry.id, entry.value.to_json());
    }
    phones.remove(0)?;
    if let Err(err) = phones.remove(0) {
        println!("  {}", err);
    }

    println!("\n=== State ===");
    println!("dirty fields: {:?}", store.dirty_fields());
    println!("touched fields: {:?}", store.touched_fields());
    println!("dirty: {}, valid: {}", store.is_dirty(), store.is_valid());

    println!("\n=== Submit ===");
    let submitter = SubmissionController::new(store.clone());
    let outcome = submitter
        .submit(
            |values| async move {
                println!("Form submitted {}", values.to_json());
                Ok::<(), Infallible>(())
            },
            |errors| println!("Form errors {}", errors.to_json()),
        )
        .await;

    println!(
        "submitted: {}, successful: {}, count: {}",
        outcome.is_submitted(),
        submitter.is_submit_successful(),
        submitter.submit_count()
    );
    println!("after reset: {}", store.get_values().to_json());

    Ok(())
}
