//! Grouping loans by borrower identity

use indexmap::IndexMap;

use crate::models::loan::{Borrower, BorrowerLoans, LoanView};

/// Group loans by (name, phone).
///
/// Groups are ordered by their most recent borrow and each group's loans are
/// newest first.
pub fn group_by_borrower(mut loans: Vec<LoanView>) -> Vec<BorrowerLoans> {
    loans.sort_by(|a, b| b.loan.borrowed_at.cmp(&a.loan.borrowed_at));

    let mut groups: IndexMap<Borrower, BorrowerLoans> = IndexMap::new();
    for view in loans {
        let group = groups
            .entry(view.loan.borrower())
            .or_insert_with(|| BorrowerLoans {
                borrower_name: view.loan.borrower_name.clone(),
                borrower_phone: view.loan.borrower_phone.clone(),
                total_copies: 0,
                active_copies: 0,
                loans: Vec::new(),
            });

        group.total_copies += i64::from(view.loan.copies_borrowed);
        if view.loan.is_active() {
            group.active_copies += i64::from(view.loan.copies);
        }
        group.loans.push(view);
    }

    groups.into_values().collect()
}
