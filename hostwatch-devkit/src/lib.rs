/*!
# HostWatch DevKit - Doublures de test pour le kernel et l'agent

Bibliothèque partagée par les tests des autres crates:
- Collecteur HTTP bouchon qui enregistre les pushes des agents
- Harness avec expectations sur les pushes reçus
- Builders de payloads JSON (échantillons, login)
*/

pub mod collector_stub;
pub mod payloads;
pub mod test_utils;

pub use collector_stub::{RecordedPush, StubCollector};
pub use payloads::{login_body, SampleBuilder};
pub use test_utils::TestHarness;
