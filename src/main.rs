//! Loan Reconciler CLI
//!
//! Reconciles flat-rate loan files into day-count schedules, and offers a few
//! helpers for inspecting payments, schedules and generated test data.
//! Reconciliation defaults come from RECONCILE_* environment variables and
//! can be overridden by flags.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use loan_reconciler::batch::{BatchRunner, Discrepancy, Skipped};
use loan_reconciler::calendar::parse_contract_date;
use loan_reconciler::config::ReconcileConfig;
use loan_reconciler::loan::{populate_loan_book, Loan, LoanIdGenerator};
use loan_reconciler::schedule::{amortization_schedule, payment, FlatRateTerms};
use loan_reconciler::storage::{load_loans, write_rows, CsvLoanSource, CsvScheduleSink};
use loan_reconciler::synthetic::{assign_ids, RandomSyntheticSource, SyntheticSource};

#[derive(Debug, Parser)]
#[command(name = "loan-reconciler", version, about = "Flat-rate loan schedule reconciliation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reconcile every loan in a CSV file and write the schedule
    Reconcile {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Print a JSON report instead of the text summary
        #[arg(long)]
        json: bool,
        #[arg(long)]
        parallel: bool,
        /// Compute missing repayments from the flat rate
        #[arg(long)]
        derive_missing_payment: bool,
        /// APR solver tolerance
        #[arg(long)]
        tolerance: Option<f64>,
        /// Interest gap that triggers a discrepancy
        #[arg(long)]
        threshold: Option<f64>,
        /// Contract date for rows without one (YYYY-MM-DD, default today)
        #[arg(long)]
        run_date: Option<String>,
    },
    /// Fixed monthly payment for an amortizing loan
    Payment {
        #[arg(long)]
        principal: f64,
        /// Annual rate in percent
        #[arg(long)]
        apr: f64,
        #[arg(long)]
        months: u32,
    },
    /// Nominal amortization schedule for a single loan
    Schedule {
        #[arg(long)]
        principal: f64,
        #[arg(long)]
        apr: f64,
        #[arg(long)]
        months: u32,
        #[arg(long)]
        start: Option<String>,
    },
    /// Write a CSV of synthetic car-finance loans
    Generate {
        #[arg(long, default_value_t = 10)]
        count: usize,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
        /// Contract date stamped on the loans (default today)
        #[arg(long)]
        date: Option<String>,
        /// Existing loan file whose ids must not be reused
        #[arg(long)]
        existing: Option<PathBuf>,
    },
    /// Populate a random loan book and print it
    Book {
        #[arg(long, default_value_t = 10)]
        count: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Serialize)]
struct ReconcileResponse {
    loans_reconciled: usize,
    schedule_rows: usize,
    output: String,
    skipped: Vec<Skipped>,
    discrepancies: Vec<Discrepancy>,
    execution_time_ms: u64,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn date_arg(raw: Option<&str>) -> Result<NaiveDate> {
    match raw {
        Some(s) => parse_contract_date(s).with_context(|| format!("Invalid date: {}", s)),
        None => Ok(today()),
    }
}

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

#[allow(clippy::too_many_arguments)]
fn reconcile(
    input: PathBuf,
    output: PathBuf,
    json: bool,
    parallel: bool,
    derive_missing_payment: bool,
    tolerance: Option<f64>,
    threshold: Option<f64>,
    run_date: Option<String>,
) -> Result<()> {
    let start = Instant::now();

    let mut config = ReconcileConfig::from_env();
    config.parallel |= parallel;
    config.derive_missing_payment |= derive_missing_payment;
    if let Some(t) = tolerance {
        config.solver.tolerance = t;
    }
    if let Some(t) = threshold {
        config.discrepancy_threshold = t;
    }
    let run_date = date_arg(run_date.as_deref())?;

    let source = CsvLoanSource::new(&input);
    let mut sink = CsvScheduleSink::new(&output);
    let report = BatchRunner::new(config)
        .run(&source, &mut sink, run_date)
        .with_context(|| format!("Failed to reconcile {}", input.display()))?;

    if json {
        let response = ReconcileResponse {
            loans_reconciled: report.loans_reconciled,
            schedule_rows: report.rows.len(),
            output: output.display().to_string(),
            skipped: report.skipped,
            discrepancies: report.discrepancies,
            execution_time_ms: start.elapsed().as_millis() as u64,
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("Loan Reconciler v{}", env!("CARGO_PKG_VERSION"));
    println!("=====================\n");
    println!("Input:  {}", input.display());
    println!("Output: {}", output.display());
    println!("Run date: {}", run_date);
    println!();
    println!("Loans reconciled: {}", report.loans_reconciled);
    println!("Schedule rows:    {}", report.rows.len());
    println!("Skipped:          {}", report.skipped.len());
    for skip in &report.skipped {
        println!("  {:<20} {}", skip.loan_id, skip.reason);
    }

    println!("\nVerification:");
    if report.discrepancies.is_empty() {
        println!("  All schedules close on their flat-rate targets");
    } else {
        println!("{:<20} {:>24} {:>14} {:>14}", "Loan", "Kind", "Target Int", "Actual Int");
        println!("{}", "-".repeat(75));
        for d in &report.discrepancies {
            println!(
                "{:<20} {:>24} {:>14.2} {:>14.2}",
                d.loan_id,
                format!("{:?}", d.kind),
                d.target_interest,
                d.actual_interest
            );
        }
    }

    println!("\nCompleted in {:?}", start.elapsed());
    Ok(())
}

fn show_schedule(principal: f64, apr: f64, months: u32, start: Option<String>) -> Result<()> {
    let start = date_arg(start.as_deref())?;
    let loan = Loan::new("LOAN-0001", "CUST-0001", principal, apr, months, start)?;
    let rows = amortization_schedule(&loan)?;

    println!("Principal ${:.2} at {:.2}% over {} months", principal, apr, months);
    println!("Monthly payment: ${:.2}\n", loan.monthly_payment);
    println!("{:>6} {:>12} {:>12} {:>12} {:>12} {:>14}", "Period", "Date", "Payment", "Principal", "Interest", "Balance");
    println!("{}", "-".repeat(74));
    for row in &rows {
        println!(
            "{:>6} {:>12} {:>12.2} {:>12.2} {:>12.2} {:>14.2}",
            row.period, row.date, row.payment, row.principal, row.interest, row.balance
        );
    }

    let total_interest: f64 = rows.iter().map(|r| r.interest).sum();
    println!("\nTotal interest: ${:.2}", total_interest);
    Ok(())
}

fn generate(count: usize, output: PathBuf, seed: Option<u64>, date: Option<String>, existing: Option<PathBuf>) -> Result<()> {
    let contract_date = date_arg(date.as_deref())?;

    let existing_ids: HashSet<String> = match existing {
        Some(path) => load_loans(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?
            .into_iter()
            .map(|l| l.loan_id)
            .collect(),
        None => HashSet::new(),
    };

    let mut source = RandomSyntheticSource::new(rng_from(seed));
    let records = source.fetch_synthetic_records(count)?;
    let mut ids = LoanIdGenerator::new(rng_from(seed.map(|s| s.wrapping_add(1))));
    let loans = assign_ids(records, &existing_ids, contract_date, &mut ids)?;

    write_rows(&output, &loans).with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Wrote {} loans to {}", loans.len(), output.display());
    Ok(())
}

fn show_book(count: usize, seed: Option<u64>) -> Result<()> {
    let mut rng = rng_from(seed);
    let book = populate_loan_book(count, today(), &mut rng)?;

    println!("{:<10} {:<10} {:>6} {:>12} {:>8} {:>6} {:>10}", "Loan", "Borrower", "Score", "Principal", "APR", "Term", "Payment");
    println!("{}", "-".repeat(68));
    for loan in book.loans() {
        let score = book.get_borrower(&loan.borrower_id).map(|b| b.credit_score).unwrap_or_default();
        println!(
            "{:<10} {:<10} {:>6} {:>12.2} {:>8.2} {:>6} {:>10.2}",
            loan.id, loan.borrower_id, score, loan.principal, loan.apr, loan.term_months, loan.monthly_payment
        );
    }

    let total: f64 = book.loans().map(|l| l.principal).sum();
    println!("\n{} loans, ${:.2} principal outstanding", book.loan_count(), total);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Command::Reconcile {
            input,
            output,
            json,
            parallel,
            derive_missing_payment,
            tolerance,
            threshold,
            run_date,
        } => reconcile(input, output, json, parallel, derive_missing_payment, tolerance, threshold, run_date),
        Command::Payment { principal, apr, months } => {
            let monthly = payment(principal, apr, months)?;
            let flat = FlatRateTerms::compute(principal, apr, months)?;
            println!("Amortizing payment: ${:.2}", monthly);
            println!(
                "Flat-rate repayment: ${:.2} (interest ${:.2}, payable ${:.2})",
                flat.monthly_repayment, flat.total_interest, flat.total_payable
            );
            Ok(())
        }
        Command::Schedule { principal, apr, months, start } => show_schedule(principal, apr, months, start),
        Command::Generate { count, output, seed, date, existing } => generate(count, output, seed, date, existing),
        Command::Book { count, seed } => show_book(count, seed),
    }
}
