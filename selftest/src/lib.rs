/*!

Provides utilities for testing `kubetest` without touching a real cluster, and a `kind` harness
for the tests that need one.

[`FakeKubectl`] is a scripted stand-in for the `kubectl` binary: it records every invocation
and answers with canned output chosen by matching its arguments.

!*/

pub mod cluster;
#[cfg(unix)]
pub mod fake_kubectl;
mod test_settings;

pub use cluster::Cluster;
#[cfg(unix)]
pub use fake_kubectl::FakeKubectl;
pub use test_settings::TestSettings;
