//! The script/engine bridge.
//!
//! Engine state is exposed to scripts as read-only snapshot proxies
//! implementing [`ScriptObject`]; mutating `sim` methods enqueue actions the
//! engine applies when the evaluation returns. Callback declarations from
//! the script file are sorted by phase and invoked by the generation loop
//! with their documented bindings.

use crate::chromosome::Chromosome;
use crate::errors::SimError;
use crate::genome::Genome;
use crate::mutation::{Mutation, MutationPool, MutationType, Substitution};
use crate::subpopulation::Subpopulation;
use germline_script::{
    names, CallbackKind, CompiledCallback, Interpreter, Script, ScriptError, ScriptErrorKind,
    ScriptObject, Value,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A deferred engine mutation requested from script code.
#[derive(Debug, Clone, PartialEq)]
pub enum SimAction {
    AddSubpop { subpop: i64, size: usize },
    SetMigration { target: i64, source: i64, rate: f64 },
    SetSelfing { subpop: i64, rate: f64 },
    SetSize { subpop: i64, size: usize },
    AddMutation {
        mutation_type: i64,
        position: i64,
        subpop: i64,
        copies: usize,
    },
}

pub type ActionQueue = Rc<RefCell<Vec<SimAction>>>;

/// A callback plus its parsed filter id (mutation type for fitness,
/// subpopulation for mate choice).
#[derive(Clone)]
pub struct FilteredCallback {
    pub filter: Option<i64>,
    pub callback: CompiledCallback,
}

/// The engine's scripting context for one run.
///
/// The `sim` constant stays bound to one shared [`SimObj`] whose interior
/// state the engine refreshes before each callback phase, so callbacks
/// registered early still observe current state.
pub struct ScriptHost {
    pub interpreter: Interpreter,
    pub fitness: Vec<FilteredCallback>,
    pub mate_choice: Vec<FilteredCallback>,
    pub modify_child: Vec<CompiledCallback>,
    pub sim: Rc<SimObj>,
}

impl ScriptHost {
    /// Evaluate a script's top-level statements and sort its callback
    /// declarations by phase.
    pub fn new(script: &Script, sim: Rc<SimObj>) -> Result<Self, SimError> {
        let mut interpreter = Interpreter::new(&script.usage);
        interpreter
            .define_constant(
                "sim",
                Value::object(Rc::clone(&sim) as Rc<dyn ScriptObject>),
            )
            .map_err(|e| SimError::script("initialization", e))?;
        interpreter
            .run(script)
            .map_err(|e| SimError::script("initialization", e))?;

        let mut fitness = Vec::new();
        let mut mate_choice = Vec::new();
        let mut modify_child = Vec::new();
        for callback in interpreter.callbacks().to_vec() {
            match callback.kind {
                CallbackKind::Fitness => fitness.push(FilteredCallback {
                    filter: parse_filter(callback.filter.as_deref(), 'm', "fitness")?,
                    callback,
                }),
                CallbackKind::MateChoice => mate_choice.push(FilteredCallback {
                    filter: parse_filter(callback.filter.as_deref(), 'p', "mateChoice")?,
                    callback,
                }),
                CallbackKind::ModifyChild => {
                    if callback.filter.is_some() {
                        return Err(SimError::config(
                            "modifyChild() callbacks take no filter",
                        ));
                    }
                    modify_child.push(callback);
                }
            }
        }

        Ok(Self {
            interpreter,
            fitness,
            mate_choice,
            modify_child,
            sim,
        })
    }

    pub fn has_fitness_callbacks(&self) -> bool {
        !self.fitness.is_empty()
    }

    /// Drain the actions enqueued by the most recent evaluation.
    pub fn take_actions(&self) -> Vec<SimAction> {
        self.sim.actions.borrow_mut().drain(..).collect()
    }
}

fn parse_filter(
    filter: Option<&str>,
    prefix: char,
    callback: &'static str,
) -> Result<Option<i64>, SimError> {
    let Some(filter) = filter else {
        return Ok(None);
    };
    let id = filter
        .strip_prefix(prefix)
        .and_then(|digits| digits.parse::<i64>().ok())
        .ok_or_else(|| {
            SimError::config(format!(
                "{callback}() filter '{filter}' must be {prefix}<id>"
            ))
        })?;
    Ok(Some(id))
}

fn unknown_member(type_name: &str, name: &str) -> ScriptError {
    ScriptError::new(
        ScriptErrorKind::UndefinedSymbol,
        format!("{type_name} has no property or method named '{name}'"),
    )
}

fn method_arity(method: &str, expected: usize, got: usize) -> ScriptError {
    ScriptError::new(
        ScriptErrorKind::SignatureMismatch,
        format!("{method}() requires {expected} argument(s), got {got}"),
    )
}

fn singleton_integer(method: &str, arg: &Value, name: &str) -> Result<i64, ScriptError> {
    if arg.len() != 1 {
        return Err(ScriptError::new(
            ScriptErrorKind::SignatureMismatch,
            format!("{method}(): argument '{name}' must be a singleton"),
        ));
    }
    arg.element_as_integer(0).map_err(|_| {
        ScriptError::new(
            ScriptErrorKind::SignatureMismatch,
            format!("{method}(): argument '{name}' must be an integer"),
        )
    })
}

fn singleton_float(method: &str, arg: &Value, name: &str) -> Result<f64, ScriptError> {
    if arg.len() != 1 {
        return Err(ScriptError::new(
            ScriptErrorKind::SignatureMismatch,
            format!("{method}(): argument '{name}' must be a singleton"),
        ));
    }
    arg.element_as_float(0).map_err(|_| {
        ScriptError::new(
            ScriptErrorKind::SignatureMismatch,
            format!("{method}(): argument '{name}' must be numeric"),
        )
    })
}

/// Snapshot of one mutation.
pub struct MutationObj {
    pub type_id: i64,
    pub mutation_type: Rc<MutationTypeObj>,
    pub position: i64,
    pub selection_coeff: f64,
    pub subpop_id: i64,
    pub origin_generation: i64,
    pub dominance_coeff: f64,
}

impl MutationObj {
    pub fn snapshot(mutation: &Mutation, chromosome: &Chromosome) -> Rc<Self> {
        let mutation_type = &chromosome.mutation_types[mutation.type_index];
        Rc::new(Self {
            type_id: mutation_type.id,
            mutation_type: MutationTypeObj::snapshot(mutation_type),
            position: mutation.position,
            selection_coeff: mutation.selection_coeff,
            subpop_id: mutation.subpop_id,
            origin_generation: mutation.origin_generation,
            dominance_coeff: mutation_type.dominance_coeff,
        })
    }
}

impl ScriptObject for MutationObj {
    fn type_name(&self) -> &'static str {
        "Mutation"
    }

    fn get_property(&self, name: &str) -> Result<Value, ScriptError> {
        match names::id_of(name) {
            Some(names::POSITION) => Ok(Value::integer(self.position)),
            Some(names::SELECTION_COEFF) => Ok(Value::float(self.selection_coeff)),
            Some(names::SUBPOP_ID) => Ok(Value::integer(self.subpop_id)),
            Some(names::ORIGIN_GENERATION) => Ok(Value::integer(self.origin_generation)),
            Some(names::MUTATION_TYPE) => Ok(Value::object(
                Rc::clone(&self.mutation_type) as Rc<dyn ScriptObject>
            )),
            Some(names::DOMINANCE_COEFF) => Ok(Value::float(self.dominance_coeff)),
            _ => Err(unknown_member(self.type_name(), name)),
        }
    }

    fn call_method(&self, name: &str, _args: &[Value]) -> Result<Value, ScriptError> {
        Err(unknown_member(self.type_name(), name))
    }
}

/// Snapshot of one mutation type.
pub struct MutationTypeObj {
    pub id: i64,
    pub dominance_coeff: f64,
    pub dominance_coeff_x: Option<f64>,
    pub distribution_type: &'static str,
    pub distribution_params: Vec<f64>,
    pub convert_to_substitution: bool,
}

impl MutationTypeObj {
    pub fn snapshot(mutation_type: &MutationType) -> Rc<Self> {
        Rc::new(Self {
            id: mutation_type.id,
            dominance_coeff: mutation_type.dominance_coeff,
            dominance_coeff_x: mutation_type.dominance_coeff_x,
            distribution_type: mutation_type.dfe.code(),
            distribution_params: mutation_type.dfe.params(),
            convert_to_substitution: mutation_type.convert_to_substitution,
        })
    }
}

impl ScriptObject for MutationTypeObj {
    fn type_name(&self) -> &'static str {
        "MutationType"
    }

    fn get_property(&self, name: &str) -> Result<Value, ScriptError> {
        match names::id_of(name) {
            Some(names::ID) => Ok(Value::integer(self.id)),
            Some(names::DOMINANCE_COEFF) => Ok(Value::float(self.dominance_coeff)),
            Some(names::DOMINANCE_COEFF_X) => Ok(match self.dominance_coeff_x {
                Some(hx) => Value::float(hx),
                None => Value::Null,
            }),
            Some(names::DISTRIBUTION_TYPE) => Ok(Value::string(self.distribution_type)),
            Some(names::DISTRIBUTION_PARAMS) => {
                Ok(Value::Float(self.distribution_params.clone()))
            }
            Some(names::CONVERT_TO_SUBSTITUTION) => {
                Ok(Value::logical(self.convert_to_substitution))
            }
            _ => Err(unknown_member(self.type_name(), name)),
        }
    }

    fn call_method(&self, name: &str, _args: &[Value]) -> Result<Value, ScriptError> {
        Err(unknown_member(self.type_name(), name))
    }
}

/// Snapshot of one genome: its type plus its mutations.
pub struct GenomeObj {
    pub genome_type: String,
    pub is_null: bool,
    pub mutations: Vec<Rc<MutationObj>>,
}

impl GenomeObj {
    pub fn snapshot(genome: &Genome, chromosome: &Chromosome, pool: &MutationPool) -> Rc<Self> {
        Rc::new(Self {
            genome_type: genome.genome_type().to_string(),
            is_null: genome.is_null(),
            mutations: genome
                .mutations()
                .iter()
                .map(|&id| MutationObj::snapshot(pool.get(id), chromosome))
                .collect(),
        })
    }
}

impl ScriptObject for GenomeObj {
    fn type_name(&self) -> &'static str {
        "Genome"
    }

    fn get_property(&self, name: &str) -> Result<Value, ScriptError> {
        match names::id_of(name) {
            Some(names::GENOME_TYPE) => Ok(Value::string(self.genome_type.clone())),
            Some(names::IS_NULL_GENOME) => Ok(Value::logical(self.is_null)),
            Some(names::MUTATIONS) => Ok(Value::Object(
                self.mutations
                    .iter()
                    .map(|m| Rc::clone(m) as Rc<dyn ScriptObject>)
                    .collect(),
            )),
            _ => Err(unknown_member(self.type_name(), name)),
        }
    }

    fn call_method(&self, name: &str, args: &[Value]) -> Result<Value, ScriptError> {
        match names::id_of(name) {
            Some(names::COUNT_OF_MUTATIONS_OF_TYPE) => {
                if args.len() != 1 {
                    return Err(method_arity("countOfMutationsOfType", 1, args.len()));
                }
                let type_id = singleton_integer("countOfMutationsOfType", &args[0], "mutType")?;
                let count = self.mutations.iter().filter(|m| m.type_id == type_id).count();
                Ok(Value::integer(count as i64))
            }
            Some(names::CONTAINS_MUTATIONS) => {
                if args.len() != 1 {
                    return Err(method_arity("containsMutations", 1, args.len()));
                }
                let position = singleton_integer("containsMutations", &args[0], "position")?;
                Ok(Value::logical(
                    self.mutations.iter().any(|m| m.position == position),
                ))
            }
            _ => Err(unknown_member(self.type_name(), name)),
        }
    }
}

/// Snapshot of one subpopulation's demographic state.
pub struct SubpopObj {
    pub id: i64,
    pub individual_count: usize,
    pub selfing_rate: f64,
    pub cloning_rate: f64,
    pub sex_ratio: f64,
    pub first_male_index: usize,
    pub immigrant_ids: Vec<i64>,
    pub immigrant_fractions: Vec<f64>,
    pub cached_fitness: Vec<f64>,
}

impl SubpopObj {
    pub fn snapshot(subpop: &Subpopulation) -> Rc<Self> {
        Rc::new(Self {
            id: subpop.id,
            individual_count: subpop.parent_count(),
            selfing_rate: subpop.selfing_rate,
            cloning_rate: subpop.cloning_rate,
            sex_ratio: subpop.sex_ratio,
            first_male_index: subpop.first_male_index(),
            immigrant_ids: subpop.immigration.keys().copied().collect(),
            immigrant_fractions: subpop.immigration.values().copied().collect(),
            cached_fitness: subpop.cached_fitness().to_vec(),
        })
    }
}

impl ScriptObject for SubpopObj {
    fn type_name(&self) -> &'static str {
        "Subpopulation"
    }

    fn get_property(&self, name: &str) -> Result<Value, ScriptError> {
        match names::id_of(name) {
            Some(names::ID) => Ok(Value::integer(self.id)),
            Some(names::INDIVIDUAL_COUNT) => Ok(Value::integer(self.individual_count as i64)),
            Some(names::SELFING_RATE) => Ok(Value::float(self.selfing_rate)),
            Some(names::CLONING_RATE) => Ok(Value::float(self.cloning_rate)),
            Some(names::SEX_RATIO) => Ok(Value::float(self.sex_ratio)),
            Some(names::FIRST_MALE_INDEX) => Ok(Value::integer(self.first_male_index as i64)),
            Some(names::IMMIGRANT_SUBPOP_IDS) => Ok(Value::Integer(self.immigrant_ids.clone())),
            Some(names::IMMIGRANT_SUBPOP_FRACTIONS) => {
                Ok(Value::Float(self.immigrant_fractions.clone()))
            }
            _ => Err(unknown_member(self.type_name(), name)),
        }
    }

    fn call_method(&self, name: &str, args: &[Value]) -> Result<Value, ScriptError> {
        match names::id_of(name) {
            Some(names::CACHED_FITNESS) => {
                if args.len() != 1 {
                    return Err(method_arity("cachedFitness", 1, args.len()));
                }
                let values = self
                    .cached_fitness
                    .iter()
                    .copied()
                    .collect::<Vec<f64>>();
                Value::Float(values).subscript(&args[0])
            }
            _ => Err(unknown_member(self.type_name(), name)),
        }
    }
}

/// Snapshot of the chromosome's structural configuration.
pub struct ChromosomeObj {
    pub last_position: i64,
    pub overall_mutation_rate: f64,
    pub overall_recombination_rate: f64,
    pub recombination_end_positions: Vec<i64>,
    pub recombination_rates: Vec<f64>,
    pub gene_conversion_fraction: f64,
    pub gene_conversion_mean_length: f64,
    pub elements: Vec<Rc<GenomicElementObj>>,
    pub element_types: Vec<Rc<GenomicElementTypeObj>>,
}

impl ChromosomeObj {
    pub fn snapshot(chromosome: &Chromosome) -> Rc<Self> {
        Rc::new(Self {
            last_position: chromosome.last_position(),
            overall_mutation_rate: chromosome.overall_mutation_rate,
            overall_recombination_rate: chromosome.overall_recombination_rate(),
            recombination_end_positions: chromosome.recombination_end_positions.clone(),
            recombination_rates: chromosome.recombination_rates.clone(),
            gene_conversion_fraction: chromosome.gene_conversion.fraction,
            gene_conversion_mean_length: chromosome.gene_conversion.mean_length,
            elements: chromosome
                .elements
                .iter()
                .map(|element| {
                    Rc::new(GenomicElementObj {
                        type_id: chromosome.element_types[element.type_index].id,
                        start: element.start,
                        end: element.end,
                    })
                })
                .collect(),
            element_types: chromosome
                .element_types
                .iter()
                .map(|element_type| {
                    Rc::new(GenomicElementTypeObj {
                        id: element_type.id,
                        mutation_type_ids: element_type
                            .mutation_type_indices
                            .iter()
                            .map(|&index| chromosome.mutation_types[index].id)
                            .collect(),
                        mutation_fractions: element_type.mutation_fractions.clone(),
                    })
                })
                .collect(),
        })
    }
}

impl ScriptObject for ChromosomeObj {
    fn type_name(&self) -> &'static str {
        "Chromosome"
    }

    fn get_property(&self, name: &str) -> Result<Value, ScriptError> {
        match names::id_of(name) {
            Some(names::LAST_POSITION) => Ok(Value::integer(self.last_position)),
            Some(names::OVERALL_MUTATION_RATE) => Ok(Value::float(self.overall_mutation_rate)),
            Some(names::OVERALL_RECOMBINATION_RATE) => {
                Ok(Value::float(self.overall_recombination_rate))
            }
            Some(names::RECOMBINATION_END_POSITIONS) => {
                Ok(Value::Integer(self.recombination_end_positions.clone()))
            }
            Some(names::RECOMBINATION_RATES) => Ok(Value::Float(self.recombination_rates.clone())),
            Some(names::GENE_CONVERSION_FRACTION) => {
                Ok(Value::float(self.gene_conversion_fraction))
            }
            Some(names::GENE_CONVERSION_MEAN_LENGTH) => {
                Ok(Value::float(self.gene_conversion_mean_length))
            }
            Some(names::GENOMIC_ELEMENTS) => Ok(Value::Object(
                self.elements
                    .iter()
                    .map(|e| Rc::clone(e) as Rc<dyn ScriptObject>)
                    .collect(),
            )),
            Some(names::GENOMIC_ELEMENT_TYPES) => Ok(Value::Object(
                self.element_types
                    .iter()
                    .map(|e| Rc::clone(e) as Rc<dyn ScriptObject>)
                    .collect(),
            )),
            _ => Err(unknown_member(self.type_name(), name)),
        }
    }

    fn call_method(&self, name: &str, _args: &[Value]) -> Result<Value, ScriptError> {
        Err(unknown_member(self.type_name(), name))
    }
}

/// Snapshot of one genomic element.
pub struct GenomicElementObj {
    pub type_id: i64,
    pub start: i64,
    pub end: i64,
}

impl ScriptObject for GenomicElementObj {
    fn type_name(&self) -> &'static str {
        "GenomicElement"
    }

    fn get_property(&self, name: &str) -> Result<Value, ScriptError> {
        match names::id_of(name) {
            Some(names::ID) => Ok(Value::integer(self.type_id)),
            Some(names::START) => Ok(Value::integer(self.start)),
            Some(names::END) => Ok(Value::integer(self.end)),
            _ => Err(unknown_member(self.type_name(), name)),
        }
    }

    fn call_method(&self, name: &str, _args: &[Value]) -> Result<Value, ScriptError> {
        Err(unknown_member(self.type_name(), name))
    }
}

/// Snapshot of one genomic element type.
pub struct GenomicElementTypeObj {
    pub id: i64,
    pub mutation_type_ids: Vec<i64>,
    pub mutation_fractions: Vec<f64>,
}

impl ScriptObject for GenomicElementTypeObj {
    fn type_name(&self) -> &'static str {
        "GenomicElementType"
    }

    fn get_property(&self, name: &str) -> Result<Value, ScriptError> {
        match names::id_of(name) {
            Some(names::ID) => Ok(Value::integer(self.id)),
            Some(names::MUTATION_TYPES) => Ok(Value::Integer(self.mutation_type_ids.clone())),
            Some(names::MUTATION_FRACTIONS) => Ok(Value::Float(self.mutation_fractions.clone())),
            _ => Err(unknown_member(self.type_name(), name)),
        }
    }

    fn call_method(&self, name: &str, _args: &[Value]) -> Result<Value, ScriptError> {
        Err(unknown_member(self.type_name(), name))
    }
}

/// Snapshot of one substitution.
pub struct SubstitutionObj {
    pub type_id: i64,
    pub position: i64,
    pub selection_coeff: f64,
    pub fixation_generation: i64,
}

impl SubstitutionObj {
    pub fn snapshot(substitution: &Substitution, chromosome: &Chromosome) -> Rc<Self> {
        Rc::new(Self {
            type_id: chromosome.mutation_types[substitution.type_index].id,
            position: substitution.position,
            selection_coeff: substitution.selection_coeff,
            fixation_generation: substitution.fixation_generation,
        })
    }
}

impl ScriptObject for SubstitutionObj {
    fn type_name(&self) -> &'static str {
        "Substitution"
    }

    fn get_property(&self, name: &str) -> Result<Value, ScriptError> {
        match names::id_of(name) {
            Some(names::POSITION) => Ok(Value::integer(self.position)),
            Some(names::SELECTION_COEFF) => Ok(Value::float(self.selection_coeff)),
            Some(names::MUTATION_TYPE) => Ok(Value::integer(self.type_id)),
            Some(names::FIXATION_GENERATION) => Ok(Value::integer(self.fixation_generation)),
            _ => Err(unknown_member(self.type_name(), name)),
        }
    }

    fn call_method(&self, name: &str, _args: &[Value]) -> Result<Value, ScriptError> {
        Err(unknown_member(self.type_name(), name))
    }
}

/// The `sim` object: run state plus the action queue behind the documented
/// mutating methods. The engine refreshes the interior state before each
/// callback phase; scripts always hold the same object.
pub struct SimObj {
    pub generation: Cell<i64>,
    pub chromosome: Rc<ChromosomeObj>,
    pub subpops: RefCell<Vec<Rc<SubpopObj>>>,
    pub substitutions: RefCell<Vec<Rc<SubstitutionObj>>>,
    pub actions: ActionQueue,
}

impl SimObj {
    pub fn new(chromosome: Rc<ChromosomeObj>, generation: i64) -> Rc<Self> {
        Rc::new(Self {
            generation: Cell::new(generation),
            chromosome,
            subpops: RefCell::new(Vec::new()),
            substitutions: RefCell::new(Vec::new()),
            actions: Rc::new(RefCell::new(Vec::new())),
        })
    }
}

impl ScriptObject for SimObj {
    fn type_name(&self) -> &'static str {
        "Sim"
    }

    fn get_property(&self, name: &str) -> Result<Value, ScriptError> {
        match names::id_of(name) {
            Some(names::GENERATION) => Ok(Value::integer(self.generation.get())),
            Some(names::CHROMOSOME) => {
                Ok(Value::object(Rc::clone(&self.chromosome) as Rc<dyn ScriptObject>))
            }
            Some(names::SUBPOPULATIONS) => Ok(Value::Object(
                self.subpops
                    .borrow()
                    .iter()
                    .map(|s| Rc::clone(s) as Rc<dyn ScriptObject>)
                    .collect(),
            )),
            Some(names::SUBSTITUTIONS) => Ok(Value::Object(
                self.substitutions
                    .borrow()
                    .iter()
                    .map(|s| Rc::clone(s) as Rc<dyn ScriptObject>)
                    .collect(),
            )),
            _ => Err(unknown_member(self.type_name(), name)),
        }
    }

    fn call_method(&self, name: &str, args: &[Value]) -> Result<Value, ScriptError> {
        match names::id_of(name) {
            Some(names::ADD_SUBPOP) => {
                if args.len() != 2 {
                    return Err(method_arity("addSubpop", 2, args.len()));
                }
                let subpop = singleton_integer("addSubpop", &args[0], "subpopID")?;
                let size = singleton_integer("addSubpop", &args[1], "size")?;
                if size < 0 {
                    return Err(ScriptError::new(
                        ScriptErrorKind::Range,
                        format!("addSubpop(): size {size} is out of range"),
                    ));
                }
                self.actions.borrow_mut().push(SimAction::AddSubpop {
                    subpop,
                    size: size as usize,
                });
                Ok(Value::Null)
            }
            Some(names::SET_MIGRATION_RATES) => {
                if args.len() != 3 {
                    return Err(method_arity("setMigrationRates", 3, args.len()));
                }
                let target = singleton_integer("setMigrationRates", &args[0], "target")?;
                let source = singleton_integer("setMigrationRates", &args[1], "source")?;
                let rate = singleton_float("setMigrationRates", &args[2], "rate")?;
                self.actions
                    .borrow_mut()
                    .push(SimAction::SetMigration { target, source, rate });
                Ok(Value::Null)
            }
            Some(names::SET_SELFING_RATE) => {
                if args.len() != 2 {
                    return Err(method_arity("setSelfingRate", 2, args.len()));
                }
                let subpop = singleton_integer("setSelfingRate", &args[0], "subpopID")?;
                let rate = singleton_float("setSelfingRate", &args[1], "rate")?;
                self.actions
                    .borrow_mut()
                    .push(SimAction::SetSelfing { subpop, rate });
                Ok(Value::Null)
            }
            Some(names::SET_SUBPOPULATION_SIZE) => {
                if args.len() != 2 {
                    return Err(method_arity("setSubpopulationSize", 2, args.len()));
                }
                let subpop = singleton_integer("setSubpopulationSize", &args[0], "subpopID")?;
                let size = singleton_integer("setSubpopulationSize", &args[1], "size")?;
                if size < 0 {
                    return Err(ScriptError::new(
                        ScriptErrorKind::Range,
                        format!("setSubpopulationSize(): size {size} is out of range"),
                    ));
                }
                self.actions.borrow_mut().push(SimAction::SetSize {
                    subpop,
                    size: size as usize,
                });
                Ok(Value::Null)
            }
            Some(names::ADD_NEW_MUTATION) => {
                if args.len() != 4 {
                    return Err(method_arity("addNewMutation", 4, args.len()));
                }
                let mutation_type = singleton_integer("addNewMutation", &args[0], "mutType")?;
                let position = singleton_integer("addNewMutation", &args[1], "position")?;
                let subpop = singleton_integer("addNewMutation", &args[2], "subpopID")?;
                let copies = singleton_integer("addNewMutation", &args[3], "copies")?;
                if copies < 0 {
                    return Err(ScriptError::new(
                        ScriptErrorKind::Range,
                        format!("addNewMutation(): copies {copies} is out of range"),
                    ));
                }
                self.actions.borrow_mut().push(SimAction::AddMutation {
                    mutation_type,
                    position,
                    subpop,
                    copies: copies as usize,
                });
                Ok(Value::Null)
            }
            _ => Err(unknown_member(self.type_name(), name)),
        }
    }
}
