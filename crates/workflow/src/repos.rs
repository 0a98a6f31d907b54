use std::sync::Arc;

use procura_anonymity::IdentityRevealAudit;
use procura_budget::{BudgetException, Invoice};
use procura_orders::{Contract, Order};
use procura_projects::Project;
use procura_store::{ScopedRepository, ScopedStore};
use procura_tendering::{Quote, Rfq};

/// Typed repositories over one scoped store, one per workflow resource.
///
/// This is the only way workflow code touches storage; constructing the
/// bundle pins every repository to the same backend so a transition's staged
/// batch is consistent.
#[derive(Debug)]
pub struct ProcurementRepos<S: ?Sized> {
    pub projects: ScopedRepository<Project, S>,
    pub rfqs: ScopedRepository<Rfq, S>,
    pub quotes: ScopedRepository<Quote, S>,
    pub orders: ScopedRepository<Order, S>,
    pub contracts: ScopedRepository<Contract, S>,
    pub exceptions: ScopedRepository<BudgetException, S>,
    pub invoices: ScopedRepository<Invoice, S>,
    pub reveal_audits: ScopedRepository<IdentityRevealAudit, S>,
}

impl<S> ProcurementRepos<S>
where
    S: ScopedStore + ?Sized,
{
    pub fn new(store: &Arc<S>) -> Self {
        Self {
            projects: ScopedRepository::new(Arc::clone(store)),
            rfqs: ScopedRepository::new(Arc::clone(store)),
            quotes: ScopedRepository::new(Arc::clone(store)),
            orders: ScopedRepository::new(Arc::clone(store)),
            contracts: ScopedRepository::new(Arc::clone(store)),
            exceptions: ScopedRepository::new(Arc::clone(store)),
            invoices: ScopedRepository::new(Arc::clone(store)),
            reveal_audits: ScopedRepository::new(Arc::clone(store)),
        }
    }
}
