use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use crate::application::WalletService;
use crate::domain::{
    ConsumptionEntry, ConsumptionUpdate, CustomerId, LedgerTransaction, MealSelection, MealSlot,
    NewCustomer, Statement, format_cents, parse_cents,
};
use crate::io::StatementExporter;
use crate::settings::Settings;

/// Mealwallet - prepaid wallets for a meal subscription service
#[derive(Parser)]
#[command(name = "mealwallet")]
#[command(about = "Track customer wallets, daily meals, recharges and billing statements")]
#[command(version)]
pub struct Cli {
    /// Database file path (overrides the config file)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Config file (defaults to ./mealwallet.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Customer management commands
    #[command(subcommand)]
    Customer(CustomerCommands),

    /// Top up a customer's wallet
    Recharge {
        /// Customer name or ID
        customer: String,

        /// Amount (e.g., "500" or "500.00")
        amount: String,

        /// External payment reference
        #[arg(short, long)]
        reference: Option<String>,

        /// Date of the payment (YYYY-MM-DD, defaults to now). Must not be
        /// earlier than the customer's latest confirmed transaction
        #[arg(long)]
        date: Option<String>,
    },

    /// Confirm a pending recharge
    Confirm {
        /// Transaction ID
        id: String,
    },

    /// List recharges awaiting confirmation
    Pending {
        /// Only this customer (name or ID)
        #[arg(long)]
        customer: Option<String>,
    },

    /// Daily consumption commands
    #[command(subcommand)]
    Meal(MealCommands),

    /// Billing statement for a date range
    Statement {
        /// Customer name or ID
        customer: String,

        /// First day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// Last day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: String,

        #[arg(short, long, value_enum, default_value_t = StatementFormat::Table)]
        format: StatementFormat,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Ledger history of a customer
    Transactions {
        /// Customer name or ID
        customer: String,
    },

    /// Verify that every balance matches its ledger
    Check,
}

#[derive(Subcommand)]
pub enum CustomerCommands {
    /// Open an account for a new customer
    Add {
        name: String,

        #[arg(long)]
        mobile: Option<String>,

        #[arg(long)]
        building: Option<String>,

        #[arg(long)]
        room: Option<String>,

        /// Subscription plan label
        #[arg(long)]
        plan: Option<String>,
    },

    /// List all customers with their balances
    List,

    /// Show customer details
    Show {
        /// Customer name or ID
        customer: String,
    },
}

#[derive(Subcommand)]
pub enum MealCommands {
    /// Record what a customer took
    Add {
        /// Customer name or ID
        customer: String,

        /// Service date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        #[command(flatten)]
        meal: MealArgs,
    },

    /// Replace the slot and selection of a record
    Update {
        /// Record ID
        id: String,

        #[command(flatten)]
        meal: MealArgs,
    },

    /// Delete a record and refund its cost
    Delete {
        /// Record ID
        id: String,
    },

    /// Daily sheet of consumption records
    List {
        /// Service date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Only this customer (name or ID)
        #[arg(long)]
        customer: Option<String>,
    },
}

#[derive(Args)]
pub struct MealArgs {
    /// Meal slot: breakfast, lunch, dinner (defaults to lunch, or the
    /// current slot on update)
    #[arg(short, long)]
    slot: Option<String>,

    /// Extras only, no main meal
    #[arg(long)]
    no_main: bool,

    /// Premium main meal
    #[arg(long, conflicts_with = "no_main")]
    premium: bool,

    /// Name of the special dish
    #[arg(long)]
    dish: Option<String>,

    /// Extra rice units
    #[arg(long, default_value_t = 0)]
    rice: u32,

    /// Extra bread units
    #[arg(long, default_value_t = 0)]
    bread: u32,
}

impl MealArgs {
    fn selection(&self) -> MealSelection {
        MealSelection {
            has_main_meal: !self.no_main,
            is_premium: self.premium,
            dish_name: self.dish.clone(),
            extra_rice: self.rice,
            extra_bread: self.bread,
        }
    }

    fn slot(&self) -> Result<Option<MealSlot>> {
        self.slot
            .as_deref()
            .map(|s| {
                MealSlot::from_str(s).ok_or_else(|| {
                    anyhow::anyhow!("Invalid meal slot '{}'. Valid slots: breakfast, lunch, dinner", s)
                })
            })
            .transpose()
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StatementFormat {
    Table,
    Csv,
    Json,
}

impl Cli {
    pub async fn run(self, settings: Settings) -> Result<()> {
        let database = self
            .database
            .unwrap_or_else(|| settings.database.path.clone());
        let service = WalletService::open(&database, settings.service_options())
            .await
            .with_context(|| format!("Failed to open database {}", database.display()))?;

        let result = match self.command {
            Commands::Init => {
                println!("Database initialized: {}", database.display());
                Ok(())
            }
            Commands::Customer(cmd) => run_customer_command(&service, cmd).await,
            Commands::Recharge {
                customer,
                amount,
                reference,
                date,
            } => run_recharge_command(&service, &customer, &amount, reference, date).await,
            Commands::Confirm { id } => {
                let id = parse_id(&id, "transaction")?;
                let transaction = service.confirm(id).await?;
                println!(
                    "Confirmed {} of {} (balance {})",
                    transaction.kind,
                    format_cents(transaction.amount),
                    transaction.balance_after.map(format_cents).unwrap_or_default()
                );
                Ok(())
            }
            Commands::Pending { customer } => run_pending_command(&service, customer).await,
            Commands::Meal(cmd) => run_meal_command(&service, cmd).await,
            Commands::Statement {
                customer,
                from,
                to,
                format,
                output,
            } => run_statement_command(&service, &customer, &from, &to, format, output).await,
            Commands::Transactions { customer } => {
                let customer_id = resolve_customer(&service, &customer).await?;
                let history = service.list_transactions(customer_id).await?;
                print_transactions(&history);
                Ok(())
            }
            Commands::Check => run_check_command(&service).await,
        };

        service.close().await;
        result
    }
}

async fn run_customer_command(service: &WalletService, cmd: CustomerCommands) -> Result<()> {
    match cmd {
        CustomerCommands::Add {
            name,
            mobile,
            building,
            room,
            plan,
        } => {
            let account = service
                .open_account(NewCustomer {
                    name,
                    mobile_no: mobile,
                    building_no: building,
                    room_no: room,
                    plan,
                })
                .await?;
            println!("Opened account: {} ({})", account.name, account.id);
        }

        CustomerCommands::List => {
            let accounts = service.list_accounts().await?;
            if accounts.is_empty() {
                println!("No customers found.");
            } else {
                println!("{:<36}  {:<20} {:<10} {:>12}", "ID", "NAME", "ADDRESS", "BALANCE");
                println!("{}", "-".repeat(82));
                for account in accounts {
                    println!(
                        "{:<36}  {:<20} {:<10} {:>12}",
                        account.id,
                        truncate(&account.name, 20),
                        account.address().unwrap_or_default(),
                        format_cents(account.balance)
                    );
                }
            }
        }

        CustomerCommands::Show { customer } => {
            let customer_id = resolve_customer(service, &customer).await?;
            let info = service.get_account_info(customer_id).await?;
            let account = &info.account;

            println!("Customer: {}", account.name);
            println!("  ID:            {}", account.id);
            if let Some(mobile) = &account.mobile_no {
                println!("  Mobile:        {}", mobile);
            }
            if let Some(address) = account.address() {
                println!("  Address:       {}", address);
            }
            if let Some(plan) = &account.plan {
                println!("  Plan:          {}", plan);
            }
            println!(
                "  Opened:        {}",
                account.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!();
            println!("  Balance:       {}", format_cents(account.balance));
            println!("  Meals logged:  {}", info.record_count);
            if info.pending_count > 0 {
                println!("  Pending:       {} recharge(s)", info.pending_count);
            }
            if let Some(last) = info.last_activity {
                println!("  Last activity: {}", last.format("%Y-%m-%d %H:%M:%S"));
            }
        }
    }
    Ok(())
}

async fn run_recharge_command(
    service: &WalletService,
    customer: &str,
    amount: &str,
    reference: Option<String>,
    date: Option<String>,
) -> Result<()> {
    let customer_id = resolve_customer(service, customer).await?;
    let amount = parse_cents(amount).context("Invalid amount format. Use '500.00' or '500'")?;
    let occurred_at = match date {
        Some(date) => {
            let occurred_at = crate::domain::start_of_day(parse_date(&date)?);
            ensure_not_before_history(service, customer_id, occurred_at).await?;
            occurred_at
        }
        None => Utc::now(),
    };

    let transaction = service
        .recharges()
        .recharge(customer_id, amount, reference, occurred_at)
        .await?;

    match transaction.balance_after {
        Some(balance) => println!(
            "Recharged {} (balance {})",
            format_cents(transaction.amount),
            format_cents(balance)
        ),
        None => println!(
            "Recorded pending recharge of {} ({}); run `mealwallet confirm` once acknowledged",
            format_cents(transaction.amount),
            transaction.id
        ),
    }
    Ok(())
}

/// A backdated recharge would get a balance snapshot that already includes
/// later activity, so it may not be placed before confirmed history.
async fn ensure_not_before_history(
    service: &WalletService,
    customer_id: CustomerId,
    occurred_at: DateTime<Utc>,
) -> Result<()> {
    let latest = service
        .list_transactions(customer_id)
        .await?
        .into_iter()
        .filter(LedgerTransaction::is_confirmed)
        .map(|t| t.created_at)
        .max();

    if let Some(latest) = latest.filter(|latest| occurred_at < *latest) {
        anyhow::bail!(
            "Recharge date {} is before the latest confirmed transaction ({})",
            occurred_at.date_naive(),
            latest.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

async fn run_pending_command(service: &WalletService, customer: Option<String>) -> Result<()> {
    let customer_id = match customer {
        Some(customer) => Some(resolve_customer(service, &customer).await?),
        None => None,
    };

    let pending = service.list_pending(customer_id).await?;
    if pending.is_empty() {
        println!("No pending transactions.");
    } else {
        print_transactions(&pending);
    }
    Ok(())
}

async fn run_meal_command(service: &WalletService, cmd: MealCommands) -> Result<()> {
    match cmd {
        MealCommands::Add {
            customer,
            date,
            meal,
        } => {
            let customer_id = resolve_customer(service, &customer).await?;
            let service_date = match date {
                Some(date) => parse_date(&date)?,
                None => Utc::now().date_naive(),
            };

            let outcome = service
                .record_consumption(ConsumptionEntry {
                    customer_id,
                    service_date,
                    meal_slot: meal.slot()?.unwrap_or(MealSlot::Lunch),
                    selection: meal.selection(),
                })
                .await?;
            println!(
                "Recorded {} on {}: {} (balance {}) ({})",
                outcome.record.meal_slot,
                outcome.record.service_date,
                format_cents(outcome.record.total_cost),
                format_cents(outcome.balance),
                outcome.record.id
            );
        }

        MealCommands::Update { id, meal } => {
            let id = parse_id(&id, "record")?;
            let current = service.get_consumption(id).await?;
            let previous_cost = current.total_cost;

            let outcome = service
                .update_consumption(
                    id,
                    ConsumptionUpdate {
                        meal_slot: meal.slot()?.unwrap_or(current.meal_slot),
                        selection: meal.selection(),
                    },
                )
                .await?;
            println!(
                "Updated record: {} -> {} (balance {})",
                format_cents(previous_cost),
                format_cents(outcome.record.total_cost),
                format_cents(outcome.balance)
            );
        }

        MealCommands::Delete { id } => {
            let id = parse_id(&id, "record")?;
            let outcome = service.delete_consumption(id).await?;
            println!(
                "Deleted record, refunded {} (balance {})",
                format_cents(outcome.record.total_cost),
                format_cents(outcome.balance)
            );
        }

        MealCommands::List { date, customer } => {
            let date = match date {
                Some(date) => parse_date(&date)?,
                None => Utc::now().date_naive(),
            };
            let customer_id = match customer {
                Some(customer) => Some(resolve_customer(service, &customer).await?),
                None => None,
            };

            let entries = service.list_consumption_for_date(date, customer_id).await?;
            if entries.is_empty() {
                println!("No meals recorded on {}.", date);
            } else {
                println!(
                    "{:<20} {:<10} {:<30} {:>10}  {}",
                    "CUSTOMER", "SLOT", "ITEMS", "COST", "ID"
                );
                println!("{}", "-".repeat(110));
                for entry in entries {
                    println!(
                        "{:<20} {:<10} {:<30} {:>10}  {}",
                        truncate(&entry.customer_name, 20),
                        entry.record.meal_slot.as_str(),
                        truncate(&describe(&entry.record.selection), 30),
                        format_cents(entry.record.total_cost),
                        entry.record.id
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_statement_command(
    service: &WalletService,
    customer: &str,
    from: &str,
    to: &str,
    format: StatementFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let customer_id = resolve_customer(service, customer).await?;
    let statement = service
        .build_statement(customer_id, parse_date(from)?, parse_date(to)?)
        .await?;

    let writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("Failed to create file {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };

    let exporter = StatementExporter::new(&statement);
    match format {
        StatementFormat::Table => print_statement(writer, &statement)?,
        StatementFormat::Csv => {
            exporter.write_csv(writer)?;
        }
        StatementFormat::Json => exporter.write_json(writer)?,
    }

    if let Some(path) = output {
        eprintln!("Statement written to {}", path.display());
    }
    Ok(())
}

fn print_statement(mut out: impl Write, statement: &Statement) -> Result<()> {
    let account = &statement.account;
    writeln!(out, "Statement: {} ({})", account.name, account.id)?;
    writeln!(
        out,
        "Period:    {} to {}",
        statement.range.start, statement.range.end
    )?;
    writeln!(out)?;

    if statement.records.is_empty() {
        writeln!(out, "No meals in this period.")?;
    } else {
        writeln!(out, "{:<12} {:<10} {:<30} {:>10}", "DATE", "SLOT", "ITEMS", "COST")?;
        writeln!(out, "{}", "-".repeat(65))?;
        for record in &statement.records {
            writeln!(
                out,
                "{:<12} {:<10} {:<30} {:>10}",
                record.service_date.to_string(),
                record.meal_slot.as_str(),
                truncate(&describe(&record.selection), 30),
                format_cents(record.total_cost)
            )?;
        }
    }

    writeln!(out)?;
    writeln!(out, "  Opening balance: {:>12}", format_cents(statement.opening_balance))?;
    writeln!(out, "  Recharges:       {:>12}", format_cents(statement.total_recharges))?;
    writeln!(out, "  Spent:           {:>12}", format_cents(statement.total_spent))?;
    writeln!(out, "  Net movement:    {:>12}", format_cents(statement.net_movement()))?;
    writeln!(out, "  Current balance: {:>12}", format_cents(statement.closing_balance))?;
    out.flush()?;
    Ok(())
}

fn print_transactions(transactions: &[LedgerTransaction]) {
    println!(
        "{:>6}  {:<17} {:<18} {:<24} {:>10} {:>12}  {}",
        "SEQ", "DATE", "KIND", "STATUS", "AMOUNT", "BALANCE", "ID"
    );
    println!("{}", "-".repeat(135));
    for t in transactions {
        println!(
            "{:>6}  {:<17} {:<18} {:<24} {:>10} {:>12}  {}",
            t.sequence,
            t.created_at.format("%Y-%m-%d %H:%M"),
            t.kind.as_str(),
            t.status.as_str(),
            format_cents(t.signed_amount()),
            t.balance_after.map(format_cents).unwrap_or_default(),
            t.id
        );
    }
}

async fn run_check_command(service: &WalletService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Accounts:     {}", report.accounts.len());
    println!("Transactions: {}", report.transaction_count);
    println!("Pending:      {}", report.pending_count());
    println!();

    if report.is_ok() {
        println!("Ledger is consistent.");
        return Ok(());
    }

    println!("Issues found:");
    for account in report.drifted() {
        println!(
            "  - {}: stored balance {} but ledger sums to {} (drift {})",
            account.name,
            format_cents(account.stored_balance),
            format_cents(account.ledger_balance),
            format_cents(account.drift())
        );
    }
    if report.missing_snapshots > 0 {
        println!(
            "  - {} confirmed transaction(s) without a balance snapshot",
            report.missing_snapshots
        );
    }
    if report.invalid_amounts > 0 {
        println!(
            "  - {} transaction(s) with a non-positive amount",
            report.invalid_amounts
        );
    }
    anyhow::bail!("Ledger integrity check failed");
}

/// Accept a customer ID or an unambiguous, case-insensitive name.
async fn resolve_customer(service: &WalletService, query: &str) -> Result<CustomerId> {
    if let Ok(id) = Uuid::parse_str(query) {
        return Ok(id);
    }

    let matches: Vec<_> = service
        .list_accounts()
        .await?
        .into_iter()
        .filter(|a| a.name.eq_ignore_ascii_case(query))
        .collect();
    match matches.as_slice() {
        [account] => Ok(account.id),
        [] => anyhow::bail!("No customer named '{}'", query),
        _ => anyhow::bail!(
            "{} customers are named '{}'; use the customer ID",
            matches.len(),
            query
        ),
    }
}

fn parse_id(id: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(id).with_context(|| format!("Invalid {} ID format (expected UUID)", what))
}

fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str))
}

/// Short human description of a selection, e.g. "premium (Biryani) +2 rice".
fn describe(selection: &MealSelection) -> String {
    let mut parts = Vec::new();
    if selection.has_main_meal {
        let meal = if selection.is_premium { "premium" } else { "meal" };
        match &selection.dish_name {
            Some(dish) => parts.push(format!("{} ({})", meal, dish)),
            None => parts.push(meal.to_string()),
        }
    }
    if selection.extra_rice > 0 {
        parts.push(format!("+{} rice", selection.extra_rice));
    }
    if selection.extra_bread > 0 {
        parts.push(format!("+{} bread", selection.extra_bread));
    }

    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(" ")
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
