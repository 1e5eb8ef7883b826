use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use household_ledger::{
    AccountForm, CategoryForm, NewUser, PasswordHash, TransactionForm, ValidatedPassword,
    create_account, create_category, create_household, create_transaction, create_user,
    initialize_db,
};

/// The email address of the demo user.
const DEMO_EMAIL: &str = "demo@example.com";
/// The password of the demo user.
const DEMO_PASSWORD: &str = "test";

/// A utility for creating a test database for the REST API server of Household Ledger.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test user {DEMO_EMAIL} with the password \"{DEMO_PASSWORD}\"...");

    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked(DEMO_PASSWORD),
        PasswordHash::DEFAULT_COST,
    )?;

    let user = create_user(
        NewUser {
            email: DEMO_EMAIL.to_owned(),
            name: "Demo".to_owned(),
            password_hash: Some(password_hash),
            external_id: None,
        },
        &conn,
    )?;

    println!("Creating demo household...");

    let today = OffsetDateTime::now_utc().date();
    let household = create_household("Demo Household", user.id, &conn)?;
    let account = create_account(
        household.id,
        &AccountForm {
            name: "Everyday".to_owned(),
            balance: 2500.0,
            date: today,
        },
        &conn,
    )?;

    let mut category_ids = Vec::new();
    for (name, budget) in [
        ("Groceries", Some(600.0)),
        ("Transport", Some(150.0)),
        ("Rent", None),
    ] {
        let category = create_category(
            household.id,
            &CategoryForm {
                name: name.to_owned(),
                budget,
            },
            &conn,
        )?;
        category_ids.push(category.id);
    }

    println!("Creating transactions...");

    let [groceries, transport, rent] = category_ids[..] else {
        return Err("expected three demo categories".into());
    };

    for week in 0..12 {
        let date = today - Duration::weeks(week);

        for (amount, description, category_id) in [
            (-142.35, "Supermarket", Some(groceries)),
            (-24.0, "Bus fare", Some(transport)),
            (-450.0, "Weekly rent", Some(rent)),
        ] {
            create_transaction(
                household.id,
                user.id,
                &TransactionForm {
                    category_id,
                    ..TransactionForm::new(account.id, amount, date, description)
                },
                today,
                &conn,
            )?;
        }

        if week % 2 == 0 {
            create_transaction(
                household.id,
                user.id,
                &TransactionForm::new(account.id, 1850.0, date, "Salary"),
                today,
                &conn,
            )?;
        }
    }

    println!("Success!");

    Ok(())
}
