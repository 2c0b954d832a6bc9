use std::error::Error;

use chrono::NaiveDate;
use clap::{ArgGroup, Args, Parser, Subcommand};
use ledger::{
    Account, AccountId, CsvStore, Ledger, MoneyCents, Month, SqliteStore, Store, Transaction,
    TransactionId,
};
use migration::{Migrator, MigratorTrait};
use settings::{Settings, StoreSettings};

mod settings;

type ResultCli<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "ledger")]
#[command(about = "Personal double-entry ledger")]
struct Cli {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
    /// Override the log level.
    #[arg(long)]
    level: Option<String>,
    /// Month considered as the present (defaults to the system month).
    #[arg(long)]
    current_month: Option<Month>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List accounts.
    Accounts,
    AddAccount(AddAccountArgs),
    /// List transactions by value date.
    List(ListArgs),
    /// List transactions by clearing date.
    Clearing(ClearingArgs),
    Add(AddArgs),
    Remove {
        #[arg(long)]
        id: i64,
    },
    /// List recurring operations, dependencies first.
    Recurring,
    /// Generate the recurring transactions due in a month.
    Generate {
        #[arg(long)]
        month: Month,
    },
    /// Label and payee usage counts.
    Comments,
    Balances(BalancesArgs),
}

#[derive(Args, Debug)]
struct AddAccountArgs {
    #[arg(long)]
    name: String,
    /// Create a budget account instead of a bank account.
    #[arg(long)]
    budget: bool,
    #[arg(long, conflicts_with = "budget")]
    number: Option<String>,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long)]
    since: Option<Month>,
    #[arg(long)]
    to: Option<Month>,
    #[arg(long)]
    desc: bool,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("bound").required(true).args(["since", "to"])))]
struct ClearingArgs {
    #[arg(long)]
    since: Option<Month>,
    #[arg(long)]
    to: Option<Month>,
    #[arg(long)]
    desc: bool,
}

#[derive(Args, Debug)]
struct AddArgs {
    #[arg(long)]
    date: NaiveDate,
    /// Account id or name.
    #[arg(long)]
    debit: String,
    /// Account id or name.
    #[arg(long)]
    credit: String,
    #[arg(long, allow_hyphen_values = true)]
    amount: MoneyCents,
    #[arg(long)]
    label: Option<String>,
    #[arg(long)]
    payee: Option<String>,
    #[arg(long)]
    check: Option<u32>,
    /// Clearing date, if already on the statement.
    #[arg(long)]
    cleared: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct BalancesArgs {
    /// Recompute every account balance for this month before listing.
    #[arg(long)]
    compute: Option<Month>,
    /// Only list this month.
    #[arg(long)]
    month: Option<Month>,
}

#[tokio::main]
async fn main() -> ResultCli<()> {
    let cli = Cli::parse();
    let mut settings = Settings::new(cli.config.as_deref())?;
    if let Some(level) = cli.level.clone() {
        settings.level = level;
    }

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "ledger_cli={level},ledger={level}",
            level = settings.level
        ))
        .init();

    match &settings.store {
        StoreSettings::Csv { path } => {
            tracing::debug!("using csv store in {path}");
            run(&CsvStore::new(path), cli).await
        }
        StoreSettings::Sqlite { url } => {
            tracing::debug!("using sqlite store at {url}");
            let db = sea_orm::Database::connect(url.as_str()).await?;
            Migrator::up(&db, None).await?;
            run(&SqliteStore::new(db), cli).await
        }
    }
}

async fn run<S: Store>(store: &S, cli: Cli) -> ResultCli<()> {
    let mut builder = Ledger::builder();
    if let Some(month) = cli.current_month {
        builder = builder.current_month(month);
    }
    let mut ledger = builder.load(store).await?;

    execute(&mut ledger, cli.command)?;

    if ledger.must_be_saved() {
        ledger.save(store).await?;
    }
    Ok(())
}

fn execute(ledger: &mut Ledger, command: Command) -> ResultCli<()> {
    match command {
        Command::Accounts => {
            for account in ledger.accounts.get_all() {
                println!("{}", format_account(account));
            }
        }
        Command::AddAccount(args) => {
            if ledger.accounts.find_by_name(&args.name).is_some() {
                return Err(format!("account already exists: {}", args.name).into());
            }
            let account = if args.budget {
                Account::budget(args.name)
            } else {
                Account::bank(args.name, args.number)
            };
            let account = ledger.accounts.add(account)?;
            println!("created account: {}", format_account(&account));
        }
        Command::List(args) => {
            let transactions = &ledger.transactions;
            let listed: Box<dyn Iterator<Item = &Transaction> + '_> =
                match (args.since, args.to, args.desc) {
                    (Some(from), Some(to), false) => {
                        Box::new(transactions.get_all_between(from, to))
                    }
                    (Some(from), Some(to), true) => {
                        Box::new(transactions.get_all_between_desc(from, to))
                    }
                    (Some(from), None, false) => Box::new(transactions.get_all_since(from)),
                    (Some(from), None, true) => Box::new(transactions.get_all_since_desc(from)),
                    (None, Some(to), false) => Box::new(transactions.get_all_to(to)),
                    (None, Some(to), true) => Box::new(transactions.get_all_to_desc(to)),
                    (None, None, false) => Box::new(transactions.get_all()),
                    (None, None, true) => Box::new(transactions.get_all_desc()),
                };
            print_transactions(ledger, listed);
        }
        Command::Clearing(args) => {
            let transactions = &ledger.transactions;
            let listed: Box<dyn Iterator<Item = &Transaction> + '_> =
                match (args.since, args.to, args.desc) {
                    (Some(from), _, false) => Box::new(transactions.get_pointages_since(from)),
                    (Some(from), _, true) => Box::new(transactions.get_pointages_since_desc(from)),
                    (None, Some(to), false) => Box::new(transactions.get_pointages_to(to)),
                    (None, Some(to), true) => Box::new(transactions.get_pointages_to_desc(to)),
                    (None, None, _) => Box::new(std::iter::empty()),
                };
            print_transactions(ledger, listed);
        }
        Command::Add(args) => {
            let debit = resolve_account(ledger, &args.debit)?;
            let credit = resolve_account(ledger, &args.credit)?;
            let mut transaction = Transaction::new(args.date, debit, credit, args.amount);
            transaction.label = args.label;
            transaction.payee = args.payee;
            transaction.check_number = args.check;
            transaction.clearing_date = args.cleared;
            let stored = ledger.add_transaction(transaction)?;
            println!("added: {}", format_transaction(ledger, &stored));
        }
        Command::Remove { id } => {
            let removed = ledger.remove_transaction(TransactionId::new(id))?;
            println!("removed: {}", format_transaction(ledger, &removed));
        }
        Command::Recurring => {
            for permanent in ledger.permanents.get_all()? {
                let id = permanent
                    .id
                    .map(|id| id.to_string())
                    .unwrap_or_default();
                let days: Vec<String> = permanent
                    .days
                    .iter()
                    .map(|(month, day)| format!("{month}:{day}"))
                    .collect();
                println!(
                    "{id:>5} {:<24} {:<16} {} -> {} [{}]",
                    permanent.name,
                    permanent.kind.as_str(),
                    account_name(ledger, permanent.debit),
                    account_name(ledger, permanent.credit),
                    days.join(" ")
                );
            }
        }
        Command::Generate { month } => {
            let generated = ledger.generate_recurring(month)?;
            for transaction in &generated {
                println!("generated: {}", format_transaction(ledger, transaction));
            }
            println!("{} transactions generated for {month}", generated.len());
        }
        Command::Comments => {
            let mut comments: Vec<(String, usize)> =
                ledger.transactions.construct_comment_index().into_iter().collect();
            comments.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            for (text, count) in comments {
                println!("{count:>5} {text}");
            }
        }
        Command::Balances(args) => {
            if let Some(month) = args.compute {
                let computed = ledger.compute_balances(month)?;
                tracing::info!("computed {computed} balances for {month}");
            }
            for (month, account, amount) in ledger.balances.get_all() {
                if args.month.is_some_and(|only| only != month) {
                    continue;
                }
                println!(
                    "{month} {:<24} {:>12}",
                    account_name(ledger, account),
                    amount.to_string()
                );
            }
        }
    }
    Ok(())
}

/// Accepts an account id or a (case-insensitive) account name.
fn resolve_account(ledger: &Ledger, raw: &str) -> ResultCli<AccountId> {
    if let Ok(id) = raw.trim().parse::<i64>() {
        let id = AccountId::new(id);
        if ledger.accounts.get(id).is_some() {
            return Ok(id);
        }
    }
    ledger
        .accounts
        .find_by_name(raw)
        .and_then(|account| account.id)
        .ok_or_else(|| format!("account not found: {raw}").into())
}

fn account_name(ledger: &Ledger, id: AccountId) -> String {
    ledger
        .accounts
        .get(id)
        .map(|account| account.name.clone())
        .unwrap_or_else(|| format!("#{id}"))
}

fn format_account(account: &Account) -> String {
    let id = account.id.map(|id| id.to_string()).unwrap_or_default();
    format!("{id:>5} {:<24} {}", account.name, account.kind.as_str())
}

fn format_transaction(ledger: &Ledger, transaction: &Transaction) -> String {
    let id = transaction
        .id
        .map(|id| id.to_string())
        .unwrap_or_default();
    let cleared = transaction
        .clearing_date
        .map(|date| date.to_string())
        .unwrap_or_else(|| "pending".to_string());
    let check = transaction
        .check_number
        .map(|number| format!(" #{number}"))
        .unwrap_or_default();
    format!(
        "{id:>5} {} {cleared:<10} {:<16} -> {:<16} {:>12} {}{}{check}",
        transaction.date,
        account_name(ledger, transaction.debit),
        account_name(ledger, transaction.credit),
        transaction.amount.to_string(),
        transaction.label.as_deref().unwrap_or(""),
        transaction
            .payee
            .as_deref()
            .map(|payee| format!(" ({payee})"))
            .unwrap_or_default(),
    )
}

fn print_transactions<'a>(ledger: &Ledger, transactions: impl Iterator<Item = &'a Transaction>) {
    let mut count = 0;
    for transaction in transactions {
        println!("{}", format_transaction(ledger, transaction));
        count += 1;
    }
    tracing::debug!("listed {count} transactions");
}
