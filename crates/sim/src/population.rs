//! The population and the generation engine.
//!
//! One `step` advances every subpopulation through a full generation:
//! scheduled events, fitness caching, offspring construction (with
//! recombination, gene conversion, mutation, and callbacks), introduced
//! mutations, the parent/child swap, substitution promotion, and output
//! events. The engine is single-threaded; callbacks are direct calls.

use crate::callbacks::{
    ChromosomeObj, GenomeObj, MutationObj, ScriptHost, SimAction, SimObj, SubpopObj,
    SubstitutionObj,
};
use crate::chromosome::{Chromosome, GeneConversion};
use crate::element::{GenomicElement, GenomicElementType};
use crate::errors::SimError;
use crate::events::{Event, IntroducedMutation, OutputEvent, PartialSweep, Schedule};
use crate::genome::Genome;
use crate::input::InputConfig;
use crate::mutation::{Mutation, MutationId, MutationPool, Substitution};
use crate::output;
use crate::rng::{CumulativeTable, EngineRng};
use crate::subpopulation::{fitness_factors, Subpopulation};
use germline_script::{Script, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::rc::Rc;

/// How many replacement children are drawn for one offspring slot before a
/// rejecting modifyChild callback is considered runaway.
pub const MODIFY_CHILD_RETRY_CAP: usize = 100;

pub struct Simulation {
    pub chromosome: Chromosome,
    pub subpops: BTreeMap<i64, Subpopulation>,
    pub pool: MutationPool,
    pub substitutions: Vec<Substitution>,
    events: Schedule<Event>,
    outputs: Schedule<OutputEvent>,
    introduced: Schedule<IntroducedMutation>,
    partial_sweeps: Vec<PartialSweep>,
    generation: i64,
    time_start: i64,
    duration: i64,
    rng: EngineRng,
    host: Option<ScriptHost>,
    parameters: Vec<String>,
}

impl Simulation {
    /// Build a simulation from a materialized parameter file, an optional
    /// script, and an optional seed override.
    pub fn from_config(
        config: InputConfig,
        script: Option<&Script>,
        seed_override: Option<i64>,
    ) -> Result<Self, SimError> {
        let mut chromosome = Chromosome::new();
        for mutation_type in config.mutation_types {
            chromosome.add_mutation_type(mutation_type)?;
        }
        for (id, type_ids, fractions) in config.element_types {
            let mut indices = Vec::with_capacity(type_ids.len());
            for type_id in type_ids {
                indices.push(chromosome.mutation_type_index(type_id).ok_or_else(|| {
                    SimError::config(format!("mutation type m{type_id} not defined"))
                })?);
            }
            chromosome.add_element_type(GenomicElementType::new(id, indices, fractions)?)?;
        }
        for (type_id, start, end) in config.elements {
            let type_index = chromosome.element_type_index(type_id).ok_or_else(|| {
                SimError::config(format!("genomic element type g{type_id} not defined"))
            })?;
            chromosome.add_element(GenomicElement::new(type_index, start, end)?);
        }
        chromosome.overall_mutation_rate = config.mutation_rate;
        for (end, rate) in config.recombination {
            chromosome.recombination_end_positions.push(end);
            chromosome.recombination_rates.push(rate);
        }
        if let Some((fraction, mean_length)) = config.gene_conversion {
            chromosome.gene_conversion = GeneConversion {
                fraction,
                mean_length,
            };
        }
        chromosome.initialize_draws()?;

        for sweep in &config.partial_sweeps {
            if chromosome.mutation_type_index(sweep.mutation_type).is_none() {
                return Err(SimError::config(format!(
                    "partial sweep references undefined mutation type m{}",
                    sweep.mutation_type
                )));
            }
            if !(0.0..=1.0).contains(&sweep.target_prevalence) {
                return Err(SimError::config(format!(
                    "partial sweep target prevalence {} must be in [0, 1]",
                    sweep.target_prevalence
                )));
            }
        }
        if config.duration < 1 {
            return Err(SimError::Range {
                what: "a generation duration",
                value: config.duration,
            });
        }

        let seed = seed_override
            .or(config.seed)
            .unwrap_or_else(EngineRng::generate_seed);
        let rng = EngineRng::from_seed(seed);

        let mut pool = MutationPool::new();
        let subpops = match &config.initialization_file {
            Some(path) => output::read_population_file(path, &chromosome, &mut pool)?,
            None => BTreeMap::new(),
        };

        let mut parameters = config.parameters;
        parameters.push("#SEED".to_string());
        parameters.push(seed.to_string());

        let mut simulation = Self {
            chromosome,
            subpops,
            pool,
            substitutions: Vec::new(),
            events: config.events,
            outputs: config.outputs,
            introduced: config.introduced,
            partial_sweeps: config.partial_sweeps,
            generation: config.time_start,
            time_start: config.time_start,
            duration: config.duration,
            rng,
            host: None,
            parameters,
        };

        if let Some(script) = script {
            let sim = SimObj::new(
                ChromosomeObj::snapshot(&simulation.chromosome),
                simulation.generation,
            );
            // hand the proxy the initial population state before the
            // initialization statements run
            simulation.refresh_proxy(&sim);
            let host = ScriptHost::new(script, sim)?;
            let actions = host.take_actions();
            simulation.host = Some(host);
            simulation.apply_sim_actions(actions)?;
        }

        Ok(simulation)
    }

    pub fn generation(&self) -> i64 {
        self.generation
    }

    pub fn time_start(&self) -> i64 {
        self.time_start
    }

    pub fn duration(&self) -> i64 {
        self.duration
    }

    pub fn seed(&self) -> i64 {
        self.rng.seed()
    }

    /// The input rows this run was configured from, seed included.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Run the configured number of generations.
    pub fn run(&mut self, out: &mut dyn Write) -> Result<(), SimError> {
        let end = self.time_start + self.duration;
        while self.generation < end {
            self.step(out)?;
        }
        Ok(())
    }

    /// Advance one generation.
    pub fn step(&mut self, out: &mut dyn Write) -> Result<(), SimError> {
        let generation = self.generation;
        self.apply_events(generation)?;
        self.refresh_host_state();
        self.update_fitness()?;
        self.reproduce(generation)?;
        self.apply_introduced(generation)?;
        self.swap_generations();
        self.promote_substitutions(generation)?;
        self.apply_outputs(generation, out)?;
        self.generation += 1;
        Ok(())
    }

    fn subpop(&self, id: i64) -> Result<&Subpopulation, SimError> {
        self.subpops
            .get(&id)
            .ok_or_else(|| SimError::config(format!("subpopulation p{id} not defined")))
    }

    fn subpop_mut(&mut self, id: i64) -> Result<&mut Subpopulation, SimError> {
        self.subpops
            .get_mut(&id)
            .ok_or_else(|| SimError::config(format!("subpopulation p{id} not defined")))
    }

    fn apply_events(&mut self, generation: i64) -> Result<(), SimError> {
        // a subpopulation resized to zero is dropped at the next event tick
        let dead: Vec<i64> = self
            .subpops
            .iter()
            .filter(|(_, subpop)| subpop.target_size() == 0)
            .map(|(&id, _)| id)
            .collect();
        for id in dead {
            self.subpops.remove(&id);
        }
        let live: HashSet<i64> = self.subpops.keys().copied().collect();
        for (id, subpop) in &self.subpops {
            for source in subpop.immigration.keys() {
                if !live.contains(source) {
                    return Err(SimError::config(format!(
                        "immigration into p{id} references removed subpopulation p{source}"
                    )));
                }
            }
        }

        for event in self.events.at(generation).to_vec() {
            self.apply_event(event)?;
        }
        Ok(())
    }

    fn apply_event(&mut self, event: Event) -> Result<(), SimError> {
        match event {
            Event::AddSubpopulation {
                subpop,
                size,
                source,
            } => self.add_subpopulation(subpop, size, source),
            Event::SetSize { subpop, size } => {
                self.subpop_mut(subpop)?.set_target_size(size);
                Ok(())
            }
            Event::SetMigration {
                target,
                source,
                rate,
            } => self.set_migration(target, source, rate),
            Event::SetSelfing { subpop, rate } => {
                if !(0.0..=1.0).contains(&rate) {
                    return Err(SimError::config(format!(
                        "selfing rate {rate} for p{subpop} must be in [0, 1]"
                    )));
                }
                self.subpop_mut(subpop)?.selfing_rate = rate;
                Ok(())
            }
        }
    }

    fn add_subpopulation(
        &mut self,
        subpop: i64,
        size: usize,
        source: Option<i64>,
    ) -> Result<(), SimError> {
        if self.subpops.contains_key(&subpop) {
            return Err(SimError::config(format!(
                "subpopulation p{subpop} already defined"
            )));
        }
        let mut created = Subpopulation::new(subpop, size);
        if let Some(source_id) = source {
            let parent_count = self.subpop(source_id)?.parent_count();
            if parent_count == 0 {
                return Err(SimError::config(format!(
                    "cannot split p{subpop} from empty subpopulation p{source_id}"
                )));
            }
            // founders are drawn uniformly from the source parents
            let picks: Vec<usize> = (0..size)
                .map(|_| self.rng.uniform_index(parent_count))
                .collect();
            let source = self.subpop(source_id)?;
            for (individual, pick) in picks.into_iter().enumerate() {
                created.parent_genomes[2 * individual]
                    .copy_from(&source.parent_genomes[2 * pick]);
                created.parent_genomes[2 * individual + 1]
                    .copy_from(&source.parent_genomes[2 * pick + 1]);
            }
        }
        self.subpops.insert(subpop, created);
        Ok(())
    }

    fn set_migration(&mut self, target: i64, source: i64, rate: f64) -> Result<(), SimError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(SimError::config(format!(
                "migration rate {rate} into p{target} must be in [0, 1]"
            )));
        }
        self.subpop(source)?;
        let subpop = self.subpop_mut(target)?;
        subpop.immigration.insert(source, rate);
        let sum: f64 = subpop.immigration.values().sum();
        if sum >= 1.0 {
            return Err(SimError::config(format!(
                "sum of immigration fractions into p{target} is {sum}, must be less than 1"
            )));
        }
        Ok(())
    }

    /// Keep the shared `sim` proxy in step with engine state so callbacks
    /// observe their phase's view.
    fn refresh_host_state(&mut self) {
        let Some(host) = &self.host else {
            return;
        };
        let sim = Rc::clone(&host.sim);
        self.refresh_proxy(&sim);
    }

    fn refresh_proxy(&self, sim: &Rc<SimObj>) {
        sim.generation.set(self.generation);
        *sim.subpops.borrow_mut() = self
            .subpops
            .values()
            .map(SubpopObj::snapshot)
            .collect();
        *sim.substitutions.borrow_mut() = self
            .substitutions
            .iter()
            .map(|s| SubstitutionObj::snapshot(s, &self.chromosome))
            .collect();
    }

    fn update_fitness(&mut self) -> Result<(), SimError> {
        let has_callbacks = self
            .host
            .as_ref()
            .is_some_and(ScriptHost::has_fitness_callbacks);
        if !has_callbacks {
            for subpop in self.subpops.values_mut() {
                subpop.update_fitness(&self.chromosome, &self.pool);
            }
            return Ok(());
        }

        let fitness_callbacks = self.host.as_ref().expect("checked above").fitness.clone();
        let ids: Vec<i64> = self.subpops.keys().copied().collect();
        for id in ids {
            let snapshot = SubpopObj::snapshot(&self.subpops[&id]);
            let parent_count = self.subpops[&id].parent_count();
            for individual in 0..parent_count {
                let subpop = &self.subpops[&id];
                let male = subpop.is_male(individual);
                let factors = fitness_factors(
                    &subpop.parent_genomes[2 * individual],
                    &subpop.parent_genomes[2 * individual + 1],
                    male,
                    &self.chromosome,
                    &self.pool,
                );

                let mut w = 1.0;
                for (mutation_id, homozygous, default_factor) in factors {
                    let mutation = *self.pool.get(mutation_id);
                    let type_id = self.chromosome.mutation_types[mutation.type_index].id;
                    let mut factor = default_factor;
                    for entry in &fitness_callbacks {
                        if entry.filter != Some(type_id) {
                            continue;
                        }
                        let bindings = [
                            (
                                "mut",
                                Value::object(MutationObj::snapshot(&mutation, &self.chromosome)),
                            ),
                            ("relFitness", Value::float(factor)),
                            ("homozygous", Value::logical(homozygous)),
                            ("subpop", Value::object(Rc::clone(&snapshot) as _)),
                        ];
                        let host = self.host.as_mut().expect("checked above");
                        let result = host
                            .interpreter
                            .call_callback(&entry.callback, &bindings)
                            .map_err(|e| SimError::script("fitness", e))?;
                        factor = expect_float("fitness", &result)?;
                    }
                    w *= factor;
                    if w <= 0.0 {
                        w = 0.0;
                        break;
                    }
                }

                // unfiltered callbacks replace the whole relative fitness
                for entry in &fitness_callbacks {
                    if entry.filter.is_some() {
                        continue;
                    }
                    let bindings = [
                        ("relFitness", Value::float(w)),
                        ("subpop", Value::object(Rc::clone(&snapshot) as _)),
                    ];
                    let host = self.host.as_mut().expect("checked above");
                    let result = host
                        .interpreter
                        .call_callback(&entry.callback, &bindings)
                        .map_err(|e| SimError::script("fitness", e))?;
                    w = expect_float("fitness", &result)?.max(0.0);
                }

                self.subpops
                    .get_mut(&id)
                    .expect("id collected above")
                    .set_cached_fitness(individual, w);
            }
        }

        if let Some(host) = &self.host {
            let actions = host.take_actions();
            self.apply_sim_actions(actions)?;
        }
        Ok(())
    }

    fn reproduce(&mut self, generation: i64) -> Result<(), SimError> {
        let ids: Vec<i64> = self.subpops.keys().copied().collect();
        for id in &ids {
            let subpop = self.subpops.get_mut(id).expect("key collected above");
            if subpop.parent_count() > 0 {
                subpop.build_samplers()?;
            }
        }

        let (mate_choice_callbacks, modify_child_callbacks) = match &self.host {
            Some(host) => (host.mate_choice.clone(), host.modify_child.clone()),
            None => (Vec::new(), Vec::new()),
        };
        let snapshots: HashMap<i64, Rc<SubpopObj>> = if self.host.is_some() {
            ids.iter()
                .map(|&id| (id, SubpopObj::snapshot(&self.subpops[&id])))
                .collect()
        } else {
            HashMap::new()
        };

        for &target_id in &ids {
            let target = &self.subpops[&target_id];
            let target_n = target.target_size();

            // immigration-source sampler over (self, sources)
            let mut source_ids = vec![target_id];
            let mut weights = vec![0.0];
            for (&source, &fraction) in &target.immigration {
                if !(0.0..=1.0).contains(&fraction) {
                    return Err(SimError::config(format!(
                        "immigration fraction {fraction} into p{target_id} must be in [0, 1]"
                    )));
                }
                source_ids.push(source);
                weights.push(fraction);
            }
            let immigrant_sum: f64 = weights[1..].iter().sum();
            if immigrant_sum >= 1.0 {
                return Err(SimError::config(format!(
                    "sum of immigration fractions into p{target_id} is {immigrant_sum}, must be less than 1"
                )));
            }
            weights[0] = 1.0 - immigrant_sum;
            let source_table = CumulativeTable::from_weights(&weights)?;

            let mut children = {
                let subpop = self.subpops.get_mut(&target_id).expect("key exists");
                subpop.prepare_children(target_n);
                std::mem::take(&mut subpop.child_genomes)
            };

            let result = self.fill_children(
                &mut children,
                target_id,
                target_n,
                generation,
                &source_ids,
                &source_table,
                &mate_choice_callbacks,
                &modify_child_callbacks,
                &snapshots,
            );

            self.subpops
                .get_mut(&target_id)
                .expect("key exists")
                .child_genomes = children;
            result?;
        }

        if let Some(host) = &self.host {
            let actions = host.take_actions();
            self.apply_sim_actions(actions)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn fill_children(
        &mut self,
        children: &mut [Genome],
        target_id: i64,
        target_n: usize,
        generation: i64,
        source_ids: &[i64],
        source_table: &CumulativeTable,
        mate_choice_callbacks: &[crate::callbacks::FilteredCallback],
        modify_child_callbacks: &[germline_script::CompiledCallback],
        snapshots: &HashMap<i64, Rc<SubpopObj>>,
    ) -> Result<(), SimError> {
        for k in 0..target_n {
            let mut attempts = 0;
            loop {
                let source_id = source_ids[self.rng.weighted(source_table)];
                let source = self
                    .subpops
                    .get(&source_id)
                    .ok_or_else(|| {
                        SimError::config(format!("subpopulation p{source_id} not defined"))
                    })?;
                if source.parent_count() == 0 {
                    return Err(SimError::config(format!(
                        "subpopulation p{source_id} has no parents to draw from"
                    )));
                }

                let target = &self.subpops[&target_id];
                let child_is_female = target.sex_enabled
                    && k < target_n
                        - (target_n as f64 * target.sex_ratio).round() as usize;

                let is_cloning = self.rng.coin(source.cloning_rate);
                let is_selfing = !is_cloning
                    && !source.sex_enabled
                    && self.rng.coin(source.selfing_rate);

                let parent1 = if source.sex_enabled {
                    if is_cloning {
                        if child_is_female {
                            source.draw_female(&mut self.rng)
                        } else {
                            source.draw_male(&mut self.rng)
                        }
                    } else {
                        source.draw_female(&mut self.rng)
                    }
                } else {
                    source.draw_parent(&mut self.rng)
                };

                let parent2 = if is_cloning || is_selfing {
                    parent1
                } else {
                    // a registered mateChoice callback may override the
                    // default fitness weights for the second parent
                    let mut override_weights: Option<Vec<f64>> = None;
                    for entry in mate_choice_callbacks {
                        if entry.filter.is_some() && entry.filter != Some(source_id) {
                            continue;
                        }
                        let bindings = [
                            ("weights", Value::Float(source.mate_choice_weights())),
                            (
                                "subpop",
                                Value::object(Rc::clone(&snapshots[&target_id]) as _),
                            ),
                            (
                                "sourceSubpop",
                                Value::object(Rc::clone(&snapshots[&source_id]) as _),
                            ),
                        ];
                        let host = self.host.as_mut().expect("callbacks imply a host");
                        let result = host
                            .interpreter
                            .call_callback(&entry.callback, &bindings)
                            .map_err(|e| SimError::script("mateChoice", e))?;
                        match result {
                            Value::Null => {}
                            Value::Float(values) => {
                                override_weights = Some(values);
                                break;
                            }
                            other => {
                                return Err(SimError::config(format!(
                                    "mateChoice() callback must return a float vector or NULL, got {}",
                                    other.kind()
                                )))
                            }
                        }
                    }
                    let source = &self.subpops[&source_id];
                    match override_weights {
                        Some(weights) => source.draw_parent_from_weights(&weights, &mut self.rng)?,
                        None => {
                            if source.sex_enabled {
                                source.draw_male(&mut self.rng)
                            } else {
                                source.draw_parent(&mut self.rng)
                            }
                        }
                    }
                };

                // build the two child genomes
                let source = &self.subpops[&source_id];
                for (slot, parent) in [(2 * k, parent1), (2 * k + 1, parent2)] {
                    let genome1 = &source.parent_genomes[2 * parent];
                    let genome2 = &source.parent_genomes[2 * parent + 1];
                    if is_cloning {
                        children[slot].copy_from(if slot % 2 == 0 { genome1 } else { genome2 });
                    } else {
                        let (first, second) = if self.rng.random_bit() {
                            (genome1, genome2)
                        } else {
                            (genome2, genome1)
                        };
                        let breakpoints = self.chromosome.draw_breakpoints(&mut self.rng)?;
                        children[slot].rebuild_recombinant(first, second, &breakpoints, &self.pool);
                    }

                    let new_mutations = self.chromosome.draw_mutation_count(&mut self.rng)?;
                    for _ in 0..new_mutations {
                        let mutation =
                            self.chromosome
                                .draw_mutation(&mut self.rng, generation, target_id)?;
                        let id = self.pool.allocate(mutation);
                        children[slot].insert(id, &self.pool);
                    }
                }

                if modify_child_callbacks.is_empty() {
                    break;
                }

                // the finalized proposed child goes to modifyChild
                let bindings = [
                    (
                        "childGenome1",
                        Value::object(GenomeObj::snapshot(
                            &children[2 * k],
                            &self.chromosome,
                            &self.pool,
                        )),
                    ),
                    (
                        "childGenome2",
                        Value::object(GenomeObj::snapshot(
                            &children[2 * k + 1],
                            &self.chromosome,
                            &self.pool,
                        )),
                    ),
                    ("isCloning", Value::logical(is_cloning)),
                    ("isSelfing", Value::logical(is_selfing)),
                    (
                        "subpop",
                        Value::object(Rc::clone(&snapshots[&target_id]) as _),
                    ),
                ];
                let mut accepted = true;
                for callback in modify_child_callbacks {
                    let host = self.host.as_mut().expect("callbacks imply a host");
                    let result = host
                        .interpreter
                        .call_callback(callback, &bindings)
                        .map_err(|e| SimError::script("modifyChild", e))?;
                    let keep = result.condition().map_err(|_| {
                        SimError::config(
                            "modifyChild() callback must return a logical singleton",
                        )
                    })?;
                    if !keep {
                        accepted = false;
                        break;
                    }
                }
                if accepted {
                    break;
                }
                // rejected children leave their fresh mutations unreferenced;
                // the frequency tally reclaims them at the end of the step
                attempts += 1;
                if attempts >= MODIFY_CHILD_RETRY_CAP {
                    return Err(SimError::CallbackLimit {
                        callback: "modifyChild",
                    });
                }
            }
        }
        Ok(())
    }

    fn apply_introduced(&mut self, generation: i64) -> Result<(), SimError> {
        for intro in self.introduced.at(generation).to_vec() {
            let type_index = self
                .chromosome
                .mutation_type_index(intro.mutation_type)
                .ok_or_else(|| {
                    SimError::config(format!(
                        "introduced mutation references undefined type m{}",
                        intro.mutation_type
                    ))
                })?;
            let selection_coeff = self.chromosome.mutation_types[type_index]
                .dfe
                .draw(&mut self.rng);
            let id = self.pool.allocate(Mutation {
                type_index,
                position: intro.position,
                selection_coeff,
                subpop_id: intro.subpop,
                origin_generation: generation,
            });

            let subpop = self
                .subpops
                .get_mut(&intro.subpop)
                .ok_or_else(|| {
                    SimError::config(format!("subpopulation p{} not defined", intro.subpop))
                })?;
            let child_count = subpop.child_genomes.len() / 2;
            let wanted = intro.num_homozygotes + intro.num_heterozygotes;
            if wanted > child_count {
                return Err(SimError::config(format!(
                    "cannot introduce a mutation into {wanted} of {child_count} individuals in p{}",
                    intro.subpop
                )));
            }

            // partial Fisher-Yates for distinct carriers
            let mut indices: Vec<usize> = (0..child_count).collect();
            for i in 0..wanted {
                let j = i + self.rng.uniform_index(child_count - i);
                indices.swap(i, j);
            }
            for &individual in &indices[..intro.num_homozygotes] {
                subpop.child_genomes[2 * individual].insert(id, &self.pool);
                subpop.child_genomes[2 * individual + 1].insert(id, &self.pool);
            }
            for &individual in
                &indices[intro.num_homozygotes..intro.num_homozygotes + intro.num_heterozygotes]
            {
                let strand = usize::from(self.rng.random_bit());
                subpop.child_genomes[2 * individual + strand].insert(id, &self.pool);
            }
        }
        Ok(())
    }

    fn swap_generations(&mut self) {
        for subpop in self.subpops.values_mut() {
            subpop.swap_generations();
        }
    }

    /// Tally each live mutation's copy count across all parent genomes.
    /// Returns the counts (indexed by handle) and the total genome count.
    pub fn tally_frequencies(&self) -> (Vec<u32>, usize) {
        let mut counts = vec![0u32; self.pool.capacity()];
        let mut total = 0usize;
        for subpop in self.subpops.values() {
            for genome in &subpop.parent_genomes {
                if genome.is_null() {
                    continue;
                }
                total += 1;
                for &id in genome.mutations() {
                    counts[id.0 as usize] += 1;
                }
            }
        }
        (counts, total)
    }

    fn promote_substitutions(&mut self, generation: i64) -> Result<(), SimError> {
        let (counts, total) = self.tally_frequencies();
        if total == 0 {
            return Ok(());
        }

        let tracked: HashSet<(usize, i64)> = self
            .partial_sweeps
            .iter()
            .filter_map(|sweep| {
                self.chromosome
                    .mutation_type_index(sweep.mutation_type)
                    .map(|type_index| (type_index, sweep.position))
            })
            .collect();

        let live: Vec<(MutationId, Mutation)> =
            self.pool.iter().map(|(id, m)| (id, *m)).collect();
        let mut fixed: Vec<MutationId> = Vec::new();
        for (id, mutation) in live {
            let count = counts[id.0 as usize];
            if count == 0 {
                self.pool.free(id);
                continue;
            }
            if count as usize == total {
                let mutation_type = &self.chromosome.mutation_types[mutation.type_index];
                // sweep-tracked mutations are held back so the clamp below
                // can keep them segregating
                if mutation_type.convert_to_substitution
                    && !tracked.contains(&(mutation.type_index, mutation.position))
                {
                    self.substitutions
                        .push(Substitution::from_mutation(&mutation, generation));
                    fixed.push(id);
                }
            }
        }
        for id in fixed {
            for subpop in self.subpops.values_mut() {
                for genome in &mut subpop.parent_genomes {
                    genome.remove(id);
                }
            }
            self.pool.free(id);
        }

        self.clamp_partial_sweeps(&counts, total)?;
        Ok(())
    }

    /// Resample carriers of each tracked mutation down to its target
    /// prevalence.
    fn clamp_partial_sweeps(&mut self, counts: &[u32], total: usize) -> Result<(), SimError> {
        for sweep in self.partial_sweeps.clone() {
            let Some(type_index) = self.chromosome.mutation_type_index(sweep.mutation_type) else {
                continue;
            };
            let Some((id, _)) = self
                .pool
                .iter()
                .find(|(_, m)| m.type_index == type_index && m.position == sweep.position)
            else {
                continue;
            };
            let count = counts[id.0 as usize];
            let target = (sweep.target_prevalence * total as f64).round() as u32;
            if count <= target {
                continue;
            }

            let mut carriers: Vec<(i64, usize)> = Vec::new();
            for (&subpop_id, subpop) in &self.subpops {
                for (index, genome) in subpop.parent_genomes.iter().enumerate() {
                    if genome.contains(id) {
                        carriers.push((subpop_id, index));
                    }
                }
            }
            for _ in 0..(count - target) {
                let pick = self.rng.uniform_index(carriers.len());
                let (subpop_id, index) = carriers.swap_remove(pick);
                self.subpops
                    .get_mut(&subpop_id)
                    .expect("carrier subpop exists")
                    .parent_genomes[index]
                    .remove(id);
            }
            if target == 0 {
                self.pool.free(id);
            }
        }
        Ok(())
    }

    fn apply_outputs(&mut self, generation: i64, out: &mut dyn Write) -> Result<(), SimError> {
        for event in self.outputs.at(generation).to_vec() {
            match event {
                OutputEvent::Full { filename } => match filename {
                    Some(name) => {
                        let file = File::create(&name)?;
                        let mut writer = BufWriter::new(file);
                        writeln!(writer, "#OUT: {generation} A {name}")?;
                        output::write_full(
                            &self.chromosome,
                            &self.subpops,
                            &self.pool,
                            &mut writer,
                        )?;
                    }
                    None => {
                        writeln!(out, "#OUT: {generation} A")?;
                        output::write_full(&self.chromosome, &self.subpops, &self.pool, out)?;
                    }
                },
                OutputEvent::Sample {
                    subpop,
                    size,
                    ms_format,
                } => {
                    let target = self.subpops.get(&subpop).ok_or_else(|| {
                        SimError::config(format!("subpopulation p{subpop} not defined"))
                    })?;
                    if ms_format {
                        writeln!(out, "#OUT: {generation} R p{subpop} {size} MS")?;
                        output::write_sample_ms(
                            &self.chromosome,
                            target,
                            &self.pool,
                            size,
                            &mut self.rng,
                            out,
                        )?;
                    } else {
                        writeln!(out, "#OUT: {generation} R p{subpop} {size}")?;
                        output::write_sample(
                            &self.chromosome,
                            target,
                            &self.pool,
                            size,
                            &mut self.rng,
                            out,
                        )?;
                    }
                }
                OutputEvent::Fixed => {
                    writeln!(out, "#OUT: {generation} F")?;
                    output::write_fixed(&self.chromosome, &self.substitutions, out)?;
                }
                OutputEvent::TrackType { mutation_type } => {
                    let type_index = self
                        .chromosome
                        .mutation_type_index(mutation_type)
                        .ok_or_else(|| {
                            SimError::config(format!(
                                "tracked mutation type m{mutation_type} not defined"
                            ))
                        })?;
                    let (counts, total) = self.tally_frequencies();
                    writeln!(out, "#OUT: {generation} T m{mutation_type}")?;
                    output::write_tracked(
                        &self.chromosome,
                        &self.pool,
                        &counts,
                        total,
                        type_index,
                        out,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn apply_sim_actions(&mut self, actions: Vec<SimAction>) -> Result<(), SimError> {
        for action in actions {
            match action {
                SimAction::AddSubpop { subpop, size } => {
                    self.add_subpopulation(subpop, size, None)?;
                }
                SimAction::SetMigration {
                    target,
                    source,
                    rate,
                } => self.set_migration(target, source, rate)?,
                SimAction::SetSelfing { subpop, rate } => {
                    if !(0.0..=1.0).contains(&rate) {
                        return Err(SimError::config(format!(
                            "selfing rate {rate} for p{subpop} must be in [0, 1]"
                        )));
                    }
                    self.subpop_mut(subpop)?.selfing_rate = rate;
                }
                SimAction::SetSize { subpop, size } => {
                    self.subpop_mut(subpop)?.set_target_size(size);
                }
                SimAction::AddMutation {
                    mutation_type,
                    position,
                    subpop,
                    copies,
                } => {
                    let type_index = self
                        .chromosome
                        .mutation_type_index(mutation_type)
                        .ok_or_else(|| {
                            SimError::config(format!(
                                "addNewMutation references undefined type m{mutation_type}"
                            ))
                        })?;
                    if position < 0 || position > self.chromosome.last_position() {
                        return Err(SimError::Range {
                            what: "a chromosome position",
                            value: position,
                        });
                    }
                    let selection_coeff = self.chromosome.mutation_types[type_index]
                        .dfe
                        .draw(&mut self.rng);
                    let generation = self.generation;
                    let id = self.pool.allocate(Mutation {
                        type_index,
                        position,
                        selection_coeff,
                        subpop_id: subpop,
                        origin_generation: generation,
                    });
                    let target = self.subpops.get_mut(&subpop).ok_or_else(|| {
                        SimError::config(format!("subpopulation p{subpop} not defined"))
                    })?;
                    let genome_count = target.parent_genomes.len();
                    if genome_count == 0 {
                        return Err(SimError::config(format!(
                            "cannot add a mutation to empty subpopulation p{subpop}"
                        )));
                    }
                    for _ in 0..copies {
                        let pick = self.rng.uniform_index(genome_count);
                        if !target.parent_genomes[pick].contains(id) {
                            target.parent_genomes[pick].insert(id, &self.pool);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn expect_float(callback: &'static str, value: &Value) -> Result<f64, SimError> {
    if value.len() != 1 {
        return Err(SimError::config(format!(
            "{callback}() callback must return a singleton numeric value"
        )));
    }
    value.element_as_float(0).map_err(|_| {
        SimError::config(format!(
            "{callback}() callback must return a singleton numeric value"
        ))
    })
}
