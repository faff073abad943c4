//! The query orchestrator: from a serialized query tree to an initialized
//! search iterator.
//!
//! The phases must run in order:
//!
//! 1. [`Query::build_tree`]
//! 2. [`Query::set_blacklist_blueprint`] (optional)
//! 3. [`Query::reserve_handles`]
//! 4. [`Query::optimize`] (optional)
//! 5. [`Query::fetch_postings`]
//! 6. [`Query::create_search`], once per match-data buffer
//!
//! A call out of order fails with `InvalidOperation` and leaves the query
//! unchanged. A failure while building or fetching the plan moves the query to
//! [`QueryState::Failed`], which rejects every later phase: the handles
//! already reserved in the layout belong to the lost plan.

use std::mem;

use tessera_common::{Result, error::Error};
use tessera_queryeval::index_env::IndexEnvironment;
use tessera_queryeval::search::{BEGIN_DOC_ID, DocId};
use tessera_queryeval::{Blueprint, FetchedBlueprint, MatchData, MatchDataLayout, SearchIterator};

use crate::blueprint_builder;
use crate::config::MatchingConfig;
use crate::location::Location;
use crate::request_context::RequestContext;
use crate::reserve;
use crate::resolve_view::resolve_views;
use crate::search_context::SearchContext;
use crate::term_extractor;
use crate::tree::{Node, TermData, stack_dump};
use crate::view_resolver::ViewResolver;

enum Plan {
    None,
    Built(Blueprint),
    Fetched(FetchedBlueprint),
    Failed,
}

/// Phase a [`Query`] is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    /// No tree yet.
    Empty,
    /// Tree built and resolved.
    Built,
    /// Handles reserved and blueprint built.
    Reserved,
    /// Postings fetched; searches can be created.
    Fetched,
    /// Building or fetching the plan failed.
    Failed,
}

/// One query, compiled in phases.
pub struct Query {
    config: MatchingConfig,
    label: String,
    tree: Option<Node>,
    blacklist: Option<Blueprint>,
    plan: Plan,
    docid_limit: DocId,
}

impl Query {
    pub fn new() -> Query {
        Query {
            config: MatchingConfig::default(),
            label: String::new(),
            tree: None,
            blacklist: None,
            plan: Plan::None,
            docid_limit: 0,
        }
    }

    /// Creates a query using `config` for tree building.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the configuration is invalid.
    pub fn with_config(config: MatchingConfig) -> Result<Query> {
        config.validate()?;
        Ok(Query {
            config,
            ..Query::new()
        })
    }

    pub fn state(&self) -> QueryState {
        match (&self.tree, &self.plan) {
            (None, _) => QueryState::Empty,
            (Some(_), Plan::None) => QueryState::Built,
            (Some(_), Plan::Built(_)) => QueryState::Reserved,
            (Some(_), Plan::Fetched(_)) => QueryState::Fetched,
            (Some(_), Plan::Failed) => QueryState::Failed,
        }
    }

    /// The resolved query tree, once built.
    pub fn tree(&self) -> Option<&Node> {
        self.tree.as_ref()
    }

    /// Diagnostic description of the current plan, if there is one.
    pub fn plan_string(&self) -> Option<String> {
        match &self.plan {
            Plan::None | Plan::Failed => None,
            Plan::Built(blueprint) => Some(blueprint.as_string()),
            Plan::Fetched(fetched) => Some(fetched.as_string()),
        }
    }

    /// Decodes `stack_dump`, adds the location filter and resolves all views.
    ///
    /// # Arguments
    ///
    /// * `stack_dump` - The serialized query tree, see [`stack_dump`].
    /// * `location` - A location string (`field:(...)` or `field:[...]`), or
    ///   empty. A location adds one unranked term on the field's z-curve
    ///   attribute, AND-ed with the query.
    /// * `resolver` - View to field mapping.
    /// * `env` - Index schema the resolved fields are checked against.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` for a malformed stack dump or location string,
    /// and `InvalidOperation` if a tree was already built.
    pub fn build_tree(
        &mut self,
        stack_dump: &[u8],
        location: &str,
        resolver: &ViewResolver,
        env: &dyn IndexEnvironment,
    ) -> Result<()> {
        self.expect_state("build_tree", QueryState::Empty)?;
        let mut node = stack_dump::parse(stack_dump)?;
        if !location.is_empty() {
            let location = Location::parse(location)?;
            log::debug!(
                "[{}] adding location filter on '{}'",
                self.label,
                location.zcurve_field(&self.config)
            );
            node = Node::And(vec![node, Node::Term(location.to_term(&self.config))]);
        }
        resolve_views(&mut node, resolver, env);
        self.tree = Some(node);
        log::debug!("[{}] query tree built", self.label);
        Ok(())
    }

    /// Term data of every ranked term of the tree, in tree order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if no tree was built.
    pub fn extract_terms(&self) -> Result<Vec<&TermData>> {
        let tree = self
            .tree
            .as_ref()
            .ok_or_else(|| Error::invalid_operation("extract_terms: no query tree"))?;
        Ok(term_extractor::extract_terms(tree))
    }

    /// Stores a blueprint whose documents are excluded from the result.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` once handles are reserved.
    pub fn set_blacklist_blueprint(&mut self, blacklist: Blueprint) -> Result<()> {
        match self.state() {
            QueryState::Empty | QueryState::Built => {
                self.blacklist = Some(blacklist);
                Ok(())
            }
            state => Err(out_of_order("set_blacklist_blueprint", state)),
        }
    }

    /// Reserves match-data handles for the tree and builds its blueprint.
    ///
    /// With a blacklist set, the plan becomes `AndNot(query, blacklist)`. The
    /// request's configuration governs the remaining phases.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the tree is not built or handles were
    /// already reserved, `InvalidArgument` for an invalid request
    /// configuration, and any error raised by the search context. A search
    /// context error leaves the query failed.
    pub fn reserve_handles(
        &mut self,
        request: &RequestContext,
        context: &dyn SearchContext,
        layout: &mut MatchDataLayout,
    ) -> Result<()> {
        self.expect_state("reserve_handles", QueryState::Built)?;
        request.config().validate()?;
        let Some(tree) = self.tree.as_mut() else {
            return Err(out_of_order("reserve_handles", QueryState::Empty));
        };
        let reserved_before = layout.num_term_fields();
        reserve::reserve_handles(tree, layout);
        let mut blueprint = match blueprint_builder::build(request, tree, context) {
            Ok(blueprint) => blueprint,
            Err(e) => {
                log::warn!("[{}] blueprint build failed: {e}", request.label());
                self.plan = Plan::Failed;
                return Err(e);
            }
        };
        if let Some(blacklist) = self.blacklist.take() {
            blueprint = Blueprint::AndNot(vec![blueprint, blacklist]);
        }
        self.label = request.label().to_string();
        self.config = request.config().clone();
        self.docid_limit = context.docid_limit();
        self.plan = Plan::Built(blueprint);
        log::debug!(
            "[{}] {} term fields reserved, docid limit {}",
            self.label,
            layout.num_term_fields() - reserved_before,
            self.docid_limit
        );
        Ok(())
    }

    /// Rewrites the plan without changing the matched documents.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` unless handles are reserved and postings not
    /// yet fetched.
    pub fn optimize(&mut self) -> Result<()> {
        self.expect_state("optimize", QueryState::Reserved)?;
        if let Plan::Built(blueprint) = mem::replace(&mut self.plan, Plan::None) {
            let optimized = blueprint.optimize(&self.config.optimize_options());
            log::debug!("[{}] optimized plan: {}", self.label, optimized.as_string());
            self.plan = Plan::Built(optimized);
        }
        Ok(())
    }

    /// Fetches the postings of every leaf of the plan.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` unless handles are reserved and postings not
    /// yet fetched, and the first search-context failure otherwise. After a
    /// failure the query is failed and only a fresh query can continue.
    pub fn fetch_postings(&mut self) -> Result<()> {
        self.expect_state("fetch_postings", QueryState::Reserved)?;
        if let Plan::Built(blueprint) = mem::replace(&mut self.plan, Plan::Failed) {
            match blueprint.fetch_postings(self.config.strict_postings) {
                Ok(fetched) => {
                    self.plan = Plan::Fetched(fetched);
                    log::debug!("[{}] postings fetched", self.label);
                }
                Err(e) => {
                    log::warn!("[{}] fetching postings failed: {e}", self.label);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Creates the search iterator bound to `md`, initialized over the whole
    /// document id range of the search context.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` before postings are fetched, and
    /// `ForeignHandle` if `md` was not created from the layout passed to
    /// [`reserve_handles`](Self::reserve_handles).
    pub fn create_search(&self, md: &MatchData) -> Result<Box<dyn SearchIterator>> {
        let Plan::Fetched(fetched) = &self.plan else {
            return Err(out_of_order("create_search", self.state()));
        };
        let mut search = fetched.create_search(md)?;
        search.init_range(BEGIN_DOC_ID, self.docid_limit);
        Ok(search)
    }

    fn expect_state(&self, operation: &str, expected: QueryState) -> Result<()> {
        let state = self.state();
        if state == expected {
            Ok(())
        } else {
            Err(out_of_order(operation, state))
        }
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

fn out_of_order(operation: &str, state: QueryState) -> Error {
    Error::invalid_operation(format!("{operation} in state {state:?}"))
}
