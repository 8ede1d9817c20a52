mod common;

use common::*;
use loanflow::domain::{ContractStatus, LoanStatus, PaymentStatus, TimeMs};
use loanflow::gateway::NotificationKind;
use loanflow::orchestration::{EvaluationOutcome, Policy};

#[tokio::test]
async fn test_approval_generates_loan_and_schedule() {
    let env = setup().await;
    let now = t0();
    let id = env.pending("borrower1", "sponsor1", "sponsor2", "Medical", now).await;

    let outcome = env.evaluator.evaluate(&id, now).await.unwrap();
    let EvaluationOutcome::Approved { loan_id } = outcome else {
        panic!("expected approval, got {:?}", outcome);
    };

    let contract = env.repo.get_contract(&id).await.unwrap().unwrap();
    assert_eq!(contract.status, ContractStatus::Approved);
    assert_eq!(contract.approved_at, Some(now));
    assert_eq!(contract.loan_id, Some(loan_id));

    let loan = env.repo.get_loan(&loan_id).await.unwrap().unwrap();
    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(loan.monthly_payment, dec("1066.19"));
    assert_eq!(loan.interest_rate, dec("12"));
    assert_eq!(loan.start_date, now.date());

    let payments = env.repo.list_payments(&loan_id).await.unwrap();
    assert_eq!(payments.len(), 12);
    assert!(payments.iter().all(|p| p.status == PaymentStatus::Pending));
    assert_eq!(payments.last().unwrap().due_date, loan.end_date);

    let approved_notices: Vec<_> = env
        .notifier
        .sent()
        .into_iter()
        .filter(|n| n.kind == NotificationKind::ContractApproved)
        .map(|n| n.user_id.as_str().to_string())
        .collect();
    assert_eq!(approved_notices, vec!["borrower1", "sponsor1", "sponsor2"]);
}

#[tokio::test]
async fn test_zero_rate_product_is_straight_line() {
    let env = setup().await;
    let now = t0();
    let id = env.pending("borrower1", "sponsor1", "sponsor2", "Interest Free", now).await;

    let EvaluationOutcome::Approved { loan_id } = env.evaluator.evaluate(&id, now).await.unwrap() else {
        panic!("expected approval");
    };
    let loan = env.repo.get_loan(&loan_id).await.unwrap().unwrap();
    assert_eq!(loan.monthly_payment, dec("1000"));
}

#[tokio::test]
async fn test_unapproved_documents_reject() {
    let env = setup().await;
    let now = t0();
    let id = env.create("borrower1", "sponsor1", "sponsor2", "Medical", now).await;
    env.consent(&id, "sponsor1", "sponsor2", now).await;

    let outcome = env.evaluator.evaluate(&id, now).await.unwrap();
    assert_eq!(
        outcome,
        EvaluationOutcome::Rejected {
            reason: "Missing required documents".into()
        }
    );
    let contract = env.repo.get_contract(&id).await.unwrap().unwrap();
    assert_eq!(contract.status, ContractStatus::Rejected);
    assert_eq!(contract.rejection_reason.as_deref(), Some("Missing required documents"));
    assert!(contract.loan_id.is_none());
}

#[tokio::test]
async fn test_monthly_limit_fifth_approved_sixth_rejected() {
    let env = setup_with(Policy {
        monthly_approval_limit: 5,
        sponsor_guarantee_limit: 100,
    })
    .await;
    let now = t0();

    for i in 1..=4 {
        env.approved(&format!("borrower{}", i), "sponsor1", "sponsor2", "Project", now)
            .await;
    }

    let fifth = env.pending("borrower5", "sponsor1", "sponsor2", "Project", now).await;
    let sixth = env.pending("borrower6", "sponsor1", "sponsor2", "Project", now).await;

    assert!(matches!(
        env.evaluator.evaluate(&fifth, now).await.unwrap(),
        EvaluationOutcome::Approved { .. }
    ));
    assert_eq!(
        env.evaluator.evaluate(&sixth, now).await.unwrap(),
        EvaluationOutcome::Rejected {
            reason: "Monthly approval limit reached".into()
        }
    );

    // Next month the quota starts over.
    let next_month = now.plus_ms(20 * 24 * TimeMs::HOUR);
    let seventh = env.pending("borrower7", "sponsor1", "sponsor2", "Project", next_month).await;
    assert!(matches!(
        env.evaluator.evaluate(&seventh, next_month).await.unwrap(),
        EvaluationOutcome::Approved { .. }
    ));
}

#[tokio::test]
async fn test_sponsor_capacity_rechecked_at_evaluation() {
    let env = setup().await;
    let now = t0();

    // All three pass creation while sponsor1 holds no live guarantees.
    let a = env.pending("borrower1", "sponsor1", "sponsor2", "Medical", now).await;
    let b = env.pending("borrower2", "sponsor1", "sponsor3", "Medical", now).await;
    let c = env.pending("borrower3", "sponsor4", "sponsor1", "Medical", now).await;

    for id in [&a, &b] {
        assert!(matches!(
            env.evaluator.evaluate(id, now).await.unwrap(),
            EvaluationOutcome::Approved { .. }
        ));
    }
    assert_eq!(
        env.evaluator.evaluate(&c, now).await.unwrap(),
        EvaluationOutcome::Rejected {
            reason: "Sponsor unavailable".into()
        }
    );
    let medical = env.repo.find_loan_type_by_name("Medical").await.unwrap().unwrap();
    assert_eq!(
        env.repo
            .count_live_guarantees(&loanflow::UserId::new("sponsor1"), medical.id)
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn test_not_pending_is_skipped() {
    let env = setup().await;
    let now = t0();
    let id = env.create("borrower1", "sponsor1", "sponsor2", "Project", now).await;

    assert_eq!(env.evaluator.evaluate(&id, now).await.unwrap(), EvaluationOutcome::Skipped);
    let contract = env.repo.get_contract(&id).await.unwrap().unwrap();
    assert_eq!(contract.status, ContractStatus::PendingSponsorApproval);

    let approved = env.approved("borrower2", "sponsor3", "sponsor4", "Project", now).await;
    assert_eq!(
        env.evaluator.evaluate(&approved, now).await.unwrap(),
        EvaluationOutcome::Skipped
    );
}

#[tokio::test]
async fn test_concurrent_evaluations_produce_one_loan() {
    let env = setup().await;
    let now = t0();
    let id = env.pending("borrower1", "sponsor1", "sponsor2", "Medical", now).await;

    let (first, second) = tokio::join!(env.evaluator.evaluate(&id, now), env.evaluator.evaluate(&id, now));
    let outcomes = [first.unwrap(), second.unwrap()];

    let approvals = outcomes
        .iter()
        .filter(|o| matches!(o, EvaluationOutcome::Approved { .. }))
        .count();
    assert_eq!(approvals, 1, "outcomes: {:?}", outcomes);
    assert!(outcomes.contains(&EvaluationOutcome::Skipped));
    assert_eq!(env.repo.list_loans_for_contract(&id).await.unwrap().len(), 1);
}

/// Capacity and quota are counted without a reservation, so two approvals
/// racing for a sponsor's last slot may both succeed.
#[tokio::test]
async fn test_capacity_check_is_best_effort_under_concurrency() {
    let env = setup_with(Policy {
        monthly_approval_limit: 100,
        sponsor_guarantee_limit: 1,
    })
    .await;
    let now = t0();
    let a = env.pending("borrower1", "sponsor1", "sponsor2", "Project", now).await;
    let b = env.pending("borrower2", "sponsor1", "sponsor3", "Project", now).await;

    let (ra, rb) = tokio::join!(env.evaluator.evaluate(&a, now), env.evaluator.evaluate(&b, now));
    let outcomes = [ra.unwrap(), rb.unwrap()];
    let approved = outcomes
        .iter()
        .filter(|o| matches!(o, EvaluationOutcome::Approved { .. }))
        .count();

    assert!((1..=2).contains(&approved), "outcomes: {:?}", outcomes);
    for id in [&a, &b] {
        let contract = env.repo.get_contract(id).await.unwrap().unwrap();
        assert!(contract.status.is_terminal());
        let loans = env.repo.list_loans_for_contract(id).await.unwrap();
        assert_eq!(loans.len(), usize::from(contract.status == ContractStatus::Approved));
    }
}
