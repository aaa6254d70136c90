/*!
Test Harness pour l'agent HostWatch

Facilite l'écriture de tests d'agent avec:
- Collecteur bouchon démarré automatiquement
- Expectations sur le nombre de pushes par nœud
- Assertions sur les champs du dernier échantillon reçu
*/

use crate::collector_stub::{RecordedPush, StubCollector};
use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Harness de test complet autour d'un collecteur bouchon
pub struct TestHarness {
    pub collector: StubCollector,
    expectations: Vec<Expectation>,
}

#[derive(Debug)]
struct Expectation {
    node_name: String,
    expected_count: usize,
}

impl TestHarness {
    pub async fn new() -> Result<Self> {
        env_logger::try_init().ok(); // Init logging pour tests

        Ok(Self {
            collector: StubCollector::start().await?,
            expectations: Vec::new(),
        })
    }

    pub fn url(&self) -> String {
        self.collector.url()
    }

    /// Ajoute une expectation: on s'attend à N pushes pour ce nœud
    pub fn expect_pushes(&mut self, node_name: &str, count: usize) -> &mut Self {
        self.expectations.push(Expectation {
            node_name: node_name.to_string(),
            expected_count: count,
        });
        self
    }

    /// Attend qu'au moins `count` pushes soient arrivés
    pub async fn wait_for_pushes(&self, count: usize, timeout_ms: u64) -> Result<Vec<RecordedPush>> {
        let start = std::time::Instant::now();

        while start.elapsed() < Duration::from_millis(timeout_ms) {
            let pushes = self.collector.pushes();
            if pushes.len() >= count {
                log::info!("Received {} pushes", pushes.len());
                return Ok(pushes);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        anyhow::bail!(
            "Timeout waiting for {} pushes, got {}",
            count,
            self.collector.push_count()
        );
    }

    pub fn verify_expectations(&self) -> Result<()> {
        for expectation in &self.expectations {
            let actual_count = self.collector.find_pushes_by_node(&expectation.node_name).len();
            if actual_count != expectation.expected_count {
                anyhow::bail!(
                    "Expectation failed for node '{}': expected {} pushes, got {}",
                    expectation.node_name,
                    expectation.expected_count,
                    actual_count
                );
            }
        }
        Ok(())
    }

    /// Assert qu'un champ du dernier push a une valeur donnée
    pub fn assert_field_equals(&self, field_path: &str, expected: &Value) -> Result<()> {
        let Some(body) = self.collector.last_body() else {
            anyhow::bail!("No push received");
        };
        match get_nested_field(&body, field_path) {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => anyhow::bail!("Field '{}' mismatch: expected {:?}, got {:?}", field_path, expected, actual),
            None => anyhow::bail!("Field '{}' not found in latest push", field_path),
        }
    }

    pub fn assert_field_exists(&self, field_path: &str) -> Result<()> {
        let body = self.collector.last_body().unwrap_or(Value::Null);
        if get_nested_field(&body, field_path).is_none() {
            anyhow::bail!("Field '{}' not found in latest push", field_path);
        }
        Ok(())
    }

    /// Nombre de pushes par nœud
    pub fn get_stats(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for push in self.collector.pushes() {
            let node = push.node_name.unwrap_or_default();
            *counts.entry(node).or_insert(0) += 1;
        }
        counts
    }

    pub fn reset(&mut self) {
        self.collector.clear();
        self.expectations.clear();
    }
}

fn get_nested_field<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, part| match current {
        Value::Object(obj) => obj.get(part),
        _ => None,
    })
}
