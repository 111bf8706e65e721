//! Selection of the constructor and injected members of an implementation type.
//!
//! If any constructor carries an explicit ordinal, only such constructors are considered, in
//! ascending ordinal order. Otherwise constructors are ranked by accessibility, then by the number
//! of resolvable parameters (more first), then by declaration order. Candidates with a parameter
//! which cannot be resolved are dropped.
//!
//! Resolvability here is a shallow check: a parameter is resolvable when its request can be looked
//! up, not when its whole subgraph can be built. The graph builder tries the remaining candidates
//! in rank order and moves on to the next one when building a dependency subgraph fails.

use crate::binding::{InjectionRequest, SiteKind};
use crate::catalog::{ConstructorDescriptor, MemberKind, TypeDescriptor};
use crate::error::GraphError;
use crate::shape::Shape;
use crate::unify::Substitution;
use itertools::Itertools;
use tracing::trace;

/// Shallow resolvability check used to rank constructors.
pub trait Resolvability {
    fn is_resolvable(&self, request: &InjectionRequest) -> bool;
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct MemberInjection {
    pub name: String,
    pub kind: MemberKind,
    /// One request for fields and properties; one per parameter for methods.
    pub requests: Vec<InjectionRequest>,
}

/// Chosen constructor and members of an implementation, with type arguments substituted.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ConstructionRecipe {
    pub implementation: Shape,
    /// Index into the descriptor's constructors.
    pub constructor: usize,
    pub parameters: Vec<InjectionRequest>,
    pub members: Vec<MemberInjection>,
}

impl ConstructionRecipe {
    /// All requests in injection order - constructor arguments first.
    pub fn requests(&self) -> impl Iterator<Item = &InjectionRequest> {
        self.parameters
            .iter()
            .chain(self.members.iter().flat_map(|member| member.requests.iter()))
    }
}

/// Returns a recipe per eligible constructor of `implementation`, best ranked first.
pub fn candidate_sites(
    descriptor: &TypeDescriptor,
    implementation: &Shape,
    type_arguments: &Substitution,
    resolvability: &dyn Resolvability,
) -> Result<Vec<ConstructionRecipe>, GraphError> {
    let constructors = eligible_constructors(descriptor, type_arguments, resolvability);
    if constructors.is_empty() {
        return Err(GraphError::NoEligibleConstructor(implementation.clone()));
    }

    trace!(%implementation, ?constructors, "Selected constructor candidates.");

    let members = select_members(descriptor, type_arguments);
    Ok(constructors
        .into_iter()
        .map(|constructor| ConstructionRecipe {
            implementation: implementation.clone(),
            constructor,
            parameters: constructor_requests(&descriptor.constructors[constructor], type_arguments),
            members: members.clone(),
        })
        .collect_vec())
}

fn constructor_requests(
    constructor: &ConstructorDescriptor,
    type_arguments: &Substitution,
) -> Vec<InjectionRequest> {
    constructor
        .parameters
        .iter()
        .enumerate()
        .map(|(index, parameter)| parameter.request(type_arguments, SiteKind::Constructor, index))
        .collect_vec()
}

fn eligible_constructors(
    descriptor: &TypeDescriptor,
    type_arguments: &Substitution,
    resolvability: &dyn Resolvability,
) -> Vec<usize> {
    let resolvable_count = |constructor: &ConstructorDescriptor| {
        constructor_requests(constructor, type_arguments)
            .iter()
            .filter(|request| resolvability.is_resolvable(request))
            .count()
    };

    let explicit = descriptor
        .constructors
        .iter()
        .enumerate()
        .filter_map(|(index, constructor)| constructor.ordinal.map(|ordinal| (ordinal, index)))
        .sorted_by_key(|(ordinal, _)| *ordinal)
        .map(|(_, index)| index)
        .collect_vec();

    let candidates = if explicit.is_empty() {
        descriptor
            .constructors
            .iter()
            .enumerate()
            .map(|(index, constructor)| {
                (
                    (
                        constructor.accessibility,
                        usize::MAX - resolvable_count(constructor),
                        index,
                    ),
                    index,
                )
            })
            .sorted_by_key(|(rank, _)| *rank)
            .map(|(_, index)| index)
            .collect_vec()
    } else {
        explicit
    };

    candidates
        .into_iter()
        .filter(|index| {
            let constructor = &descriptor.constructors[*index];
            resolvable_count(constructor) == constructor.parameters.len()
        })
        .collect_vec()
}

/// Returns dependency members in injection order: ordinal members ascending, then the rest in
/// declaration order.
pub fn select_members(
    descriptor: &TypeDescriptor,
    type_arguments: &Substitution,
) -> Vec<MemberInjection> {
    descriptor
        .members
        .iter()
        .enumerate()
        .filter(|(_, member)| member.is_dependency)
        .sorted_by_key(|(index, member)| (member.ordinal.is_none(), member.ordinal, *index))
        .map(|(_, member)| MemberInjection {
            name: member.name.clone(),
            kind: member.kind,
            requests: member
                .parameters
                .iter()
                .enumerate()
                .map(|(index, parameter)| {
                    parameter.request(type_arguments, member.kind.into(), index)
                })
                .collect_vec(),
        })
        .collect_vec()
}
