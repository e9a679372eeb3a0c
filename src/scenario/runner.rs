//! Executes a [`Suite`] and collects one result per scenario.
//!
//! Scenarios are grouped by fixture group and run group by group, in order of
//! each group's first scenario. Within a group they run in declaration order.
//! Whatever goes wrong inside one scenario is recorded on its result; the run
//! always continues with the next one.

use std::time::Instant;

use chrono::Utc;

use crate::client::{
    auth::AuthMode,
    client::Executor,
    template::{RequestTemplate, Variables},
    types::Response,
};
use crate::config::Config;
use crate::scenario::{
    fixture::{self, SessionFixture},
    report::{RunReport, ScenarioResult, ScenarioState, ScenarioStatus},
    FixtureGroup, Scenario, SetupStep, Suite,
};

pub struct Runner<'a> {
    config: &'a Config,
    executor: &'a dyn Executor,
}

/// A group key: scenarios without a group each get a private one.
#[derive(Debug, Clone, PartialEq, Eq)]
enum GroupKey<'s> {
    Named(&'s str),
    Solo(usize),
}

/// Per-group state, alive for exactly one pass over the group's scenarios.
struct GroupState<'s> {
    name: Option<&'s str>,
    definition: Option<&'s FixtureGroup>,
    /// Set once, on first use. A failed setup is memoized too.
    fixture: Option<Result<SessionFixture, String>>,
}

impl<'s> GroupState<'s> {
    fn new(name: Option<&'s str>, definition: Option<&'s FixtureGroup>) -> Self {
        Self {
            name,
            definition,
            fixture: None,
        }
    }

    fn publish(&mut self, vars: Variables) {
        if let Some(Ok(fixture)) = self.fixture.as_mut() {
            fixture.extend(vars);
        }
    }
}

impl<'a> Runner<'a> {
    pub fn new(config: &'a Config, executor: &'a dyn Executor) -> Self {
        Self { config, executor }
    }

    pub async fn run(&self, suite: &Suite) -> RunReport {
        let started_at = Utc::now();
        let start = Instant::now();
        tracing::info!("Running {} scenarios", suite.scenarios.len());

        let mut order: Vec<(GroupKey<'_>, Vec<usize>)> = Vec::new();
        for (i, scenario) in suite.scenarios.iter().enumerate() {
            let key = match scenario.group.as_deref() {
                Some(name) => GroupKey::Named(name),
                None => GroupKey::Solo(i),
            };
            match order.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(i),
                None => order.push((key, vec![i])),
            }
        }

        let mut results: Vec<Option<ScenarioResult>> = vec![None; suite.scenarios.len()];
        for (key, members) in order {
            let mut group = match key {
                GroupKey::Named(name) => {
                    tracing::info!("Starting fixture group `{}`", name);
                    GroupState::new(Some(name), suite.find_group(name))
                }
                GroupKey::Solo(_) => GroupState::new(None, None),
            };

            for i in members {
                results[i] = Some(self.run_scenario(&suite.scenarios[i], &mut group).await);
            }

            self.teardown(&group).await;
        }

        let results = results.into_iter().flatten().collect();
        RunReport::new(started_at, start.elapsed().as_millis() as u64, results)
    }

    async fn run_scenario(&self, scenario: &Scenario, group: &mut GroupState<'_>) -> ScenarioResult {
        let start = Instant::now();
        let mut state = ScenarioState::Pending;

        if scenario.requires_credential(group.definition) {
            if let Err(fault) = self.config.require_credential() {
                advance(&mut state, ScenarioState::Skipped, &scenario.name);
                tracing::info!("SKIP {}: {}", scenario.name, fault);
                return ScenarioResult::skipped(&scenario.name, group.name, fault.to_string());
            }
        }

        advance(&mut state, ScenarioState::Running, &scenario.name);
        let outcome = self.execute_scenario(scenario, group).await;

        let (failures, attempts, response) = match outcome {
            Ok(execution) => (execution.failures, execution.attempts, execution.response),
            Err(aborted) => (vec![aborted.reason], aborted.attempts, None),
        };

        let next = if failures.is_empty() {
            ScenarioState::Passed
        } else {
            ScenarioState::Failed
        };
        advance(&mut state, next, &scenario.name);

        let status = state.status().unwrap_or(ScenarioStatus::Fail);
        match failures.len() {
            0 => tracing::info!("PASS {}", scenario.name),
            n => tracing::info!("FAIL {} ({} failures)", scenario.name, n),
        }

        ScenarioResult {
            name: scenario.name.clone(),
            group: group.name.map(str::to_string),
            status,
            failures,
            skip_reason: None,
            attempts,
            response,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn execute_scenario(
        &self,
        scenario: &Scenario,
        group: &mut GroupState<'_>,
    ) -> Result<Execution, Aborted> {
        let mut vars = self
            .fixture(group)
            .await
            .map_err(|e| Aborted::before_request(format!("fixture setup failed: {}", e)))?
            .vars()
            .clone();

        for step in &scenario.prelude {
            let captured = self
                .run_step(step, &vars)
                .await
                .map_err(|e| Aborted::before_request(format!("prelude `{}` failed: {}", step.name, e)))?;
            vars.extend(captured);
        }

        let (response, attempts) =
            self.send(&scenario.request, &scenario.auth, &vars, scenario.retries)
                .await?;

        // All predicates run, so one result shows every violated expectation.
        let mut failures: Vec<String> = scenario
            .expect
            .iter()
            .filter_map(|predicate| predicate.evaluate(&response).err())
            .collect();

        if !scenario.capture.is_empty() {
            let (captured, missing) = fixture::capture(&response, &scenario.capture);
            group.publish(captured);
            if let Some(e) = missing {
                failures.push(e.to_string());
            }
        }

        Ok(Execution {
            failures,
            attempts,
            response: Some(response),
        })
    }

    /// Renders and sends the primary request, retrying transport failures
    /// only as many times as the scenario asked for.
    async fn send(
        &self,
        template: &RequestTemplate,
        auth: &AuthMode,
        vars: &Variables,
        retries: u32,
    ) -> Result<(Response, u32), Aborted> {
        let spec = template
            .render(vars)
            .map_err(|e| Aborted::before_request(e.to_string()))?;
        let credential = auth
            .resolve(self.config.credential())
            .map_err(|e| Aborted::before_request(e.to_string()))?;

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.executor.execute(&spec, credential.as_deref()).await {
                Ok(response) => return Ok((response, attempts)),
                Err(e) if e.is_transport() && attempts <= retries => {
                    tracing::warn!(
                        "Retrying {} after transport failure (attempt {} of {}): {}",
                        spec,
                        attempts,
                        retries + 1,
                        e
                    );
                }
                Err(e) => {
                    return Err(Aborted {
                        reason: e.to_string(),
                        attempts,
                    })
                }
            }
        }
    }

    /// The group's fixture, running its setup on first use.
    async fn fixture<'g>(
        &self,
        group: &'g mut GroupState<'_>,
    ) -> Result<&'g SessionFixture, String> {
        if group.fixture.is_none() {
            let built = self.build_fixture(group.name, group.definition).await;
            group.fixture = Some(built);
        }

        match group.fixture.as_ref() {
            Some(Ok(fixture)) => Ok(fixture),
            Some(Err(e)) => Err(e.clone()),
            None => Err("fixture was not initialized".to_string()),
        }
    }

    async fn build_fixture(
        &self,
        name: Option<&str>,
        definition: Option<&FixtureGroup>,
    ) -> Result<SessionFixture, String> {
        let mut fixture = SessionFixture::new(name.unwrap_or_default());
        let Some(definition) = definition else {
            return Ok(fixture);
        };

        for step in &definition.setup {
            tracing::info!("Setting up `{}`: {}", definition.name, step.name);
            match self.run_step(step, fixture.vars()).await {
                Ok(captured) => fixture.extend(captured),
                Err(e) => {
                    tracing::error!("Setup step `{}` of `{}` failed: {}", step.name, definition.name, e);
                    return Err(format!("step `{}`: {}", step.name, e));
                }
            }
        }

        Ok(fixture)
    }

    /// Runs a setup, prelude or teardown step and returns what it captured.
    async fn run_step(&self, step: &SetupStep, vars: &Variables) -> Result<Variables, String> {
        let spec = step.request.render(vars).map_err(|e| e.to_string())?;
        let credential = step
            .auth
            .resolve(self.config.credential())
            .map_err(|e| e.to_string())?;

        let response = self
            .executor
            .execute(&spec, credential.as_deref())
            .await
            .map_err(|e| e.to_string())?;

        let failures: Vec<String> = step
            .expect
            .iter()
            .filter_map(|predicate| predicate.evaluate(&response).err())
            .collect();
        if !failures.is_empty() {
            return Err(failures.join("; "));
        }

        match fixture::capture(&response, &step.capture) {
            (captured, None) => Ok(captured),
            (_, Some(e)) => Err(e.to_string()),
        }
    }

    async fn teardown(&self, group: &GroupState<'_>) {
        let (Some(definition), Some(Ok(fixture))) = (group.definition, group.fixture.as_ref()) else {
            return;
        };

        for step in &definition.teardown {
            if let Err(e) = self.run_step(step, fixture.vars()).await {
                tracing::warn!("Teardown step `{}` of `{}` failed: {}", step.name, definition.name, e);
            }
        }
    }
}

struct Execution {
    failures: Vec<String>,
    attempts: u32,
    response: Option<Response>,
}

/// A scenario that could not get as far as evaluating predicates.
struct Aborted {
    reason: String,
    attempts: u32,
}

impl Aborted {
    fn before_request(reason: String) -> Self {
        Self {
            reason,
            attempts: 0,
        }
    }
}

fn advance(state: &mut ScenarioState, next: ScenarioState, scenario: &str) {
    debug_assert!(
        state.can_become(next),
        "scenario `{}` cannot move from {:?} to {:?}",
        scenario,
        state,
        next
    );
    tracing::debug!("Scenario `{}`: {:?} -> {:?}", scenario, state, next);
    *state = next;
}
