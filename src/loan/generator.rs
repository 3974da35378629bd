//! Random loan book population for demos and load testing

use chrono::NaiveDate;
use log::info;
use rand::seq::SliceRandom;
use rand::Rng;

use super::LoanBook;
use crate::error::LoanResult;
use crate::schedule::round_to_cents;

const FIRST_NAMES: [&str; 22] = [
    "Emma", "Liam", "Olivia", "Noah", "Ava", "William", "Sophia", "James",
    "Isabella", "Oliver", "Charlotte", "Benjamin", "Amelia", "Lucas", "Mia",
    "Henry", "Harper", "Alexander", "Evelyn", "Michael", "Abigail", "Daniel",
];

const LAST_NAMES: [&str; 20] = [
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller",
    "Davis", "Rodriguez", "Martinez", "Hernandez", "Lopez", "Gonzalez",
    "Wilson", "Anderson", "Thomas", "Taylor", "Moore", "Jackson", "Martin",
];

/// Standard loan terms offered, in months
pub const LOAN_TERMS: [u32; 5] = [24, 36, 48, 60, 72];

/// Credit tiers as (minimum score, APR range in percent), best first
const APR_TIERS: [(u16, f64, f64); 3] = [
    (780, 2.5, 5.0),  // Excellent
    (700, 5.1, 8.5),  // Good
    (620, 8.6, 12.0), // Fair
];

/// APR range for scores below every tier
const SUBPRIME_APR: (f64, f64) = (12.1, 19.5);

/// Draw an APR for a credit score from its tier's range, rounded to 2 dp
pub fn apr_for_score<R: Rng>(credit_score: u16, rng: &mut R) -> f64 {
    let (low, high) = APR_TIERS
        .iter()
        .find(|(min_score, _, _)| credit_score >= *min_score)
        .map(|&(_, low, high)| (low, high))
        .unwrap_or(SUBPRIME_APR);

    round_to_cents(rng.gen_range(low..=high))
}

/// Build a loan book with `count` random borrowers, one loan each.
///
/// Borrowers are `CUST-0001..`, loans `LOAN-0001..`, all contracted on `start_date`.
pub fn populate_loan_book<R: Rng>(count: usize, start_date: NaiveDate, rng: &mut R) -> LoanResult<LoanBook> {
    let mut book = LoanBook::new();
    info!("Generating {} random loans...", count);

    for i in 1..=count {
        let borrower_id = format!("CUST-{:04}", i);
        let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Emma");
        let last = LAST_NAMES.choose(rng).copied().unwrap_or("Smith");
        // Upper bound is exclusive to stay inside the borrower validation range
        let credit_score: u16 = rng.gen_range(550..850);
        book.add_borrower(&borrower_id, first, last, credit_score)?;

        let loan_id = format!("LOAN-{:04}", i);
        let principal = round_to_cents(rng.gen_range(8_000.0..=45_000.0));
        let term = LOAN_TERMS.choose(rng).copied().unwrap_or(36);
        let apr = apr_for_score(credit_score, rng);

        book.create_loan(&loan_id, &borrower_id, principal, apr, term, start_date)?;
    }

    info!("Successfully populated loan book with {} loans", book.loan_count());
    Ok(book)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::LoanStatus;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_apr_tiers() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let excellent = apr_for_score(800, &mut rng);
            assert!((2.5..=5.0).contains(&excellent));

            let fair = apr_for_score(650, &mut rng);
            assert!((8.6..=12.0).contains(&fair));

            let poor = apr_for_score(560, &mut rng);
            assert!((12.1..=19.5).contains(&poor));
        }
    }

    #[test]
    fn test_populate_loan_book() {
        let mut rng = StdRng::seed_from_u64(11);
        let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let book = populate_loan_book(25, start, &mut rng).unwrap();

        assert_eq!(book.loan_count(), 25);
        assert_eq!(book.borrower_count(), 25);

        let loan = book.get_loan("LOAN-0007").unwrap();
        assert_eq!(loan.borrower_id, "CUST-0007");
        assert_eq!(loan.status(), LoanStatus::Active);
        assert!(LOAN_TERMS.contains(&loan.term_months));
        assert!(loan.principal >= 8_000.0 && loan.principal <= 45_000.0);
        assert!(loan.monthly_payment > 0.0);
    }
}
