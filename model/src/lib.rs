/*!

This library verifies a live Kubernetes cluster by driving the `kubectl` binary.

[`Kubectl`] issues commands through a [`Runner`] and decodes their YAML output into
[`Resource`] documents. Templated manifests are rendered to scratch files and applied or deleted
with [`Kubectl::deploy`] and [`Kubectl::delete`]. Cluster state converges asynchronously, so
checks are usually wrapped in [`wait_until`], which retries an assertion until it holds or a
timeout passes.

!*/

#![deny(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::panicking_unwrap,
    clippy::unwrap_in_result,
    clippy::unwrap_used
)]

pub use command::{CommandLine, CommandResult, ProcessRunner, Runner};
pub use configuration::{Config, Feature};
pub use error::{Error, ErrorKind, Result};
pub use expect::{
    expect_at_least, expect_contains, expect_eq, expect_excludes, expect_match, expect_true,
};
pub use http::{HttpProbe, HttpResponse};
pub use kubectl::{Kubectl, PortForward};
pub use manifest::{random_name, Manifest, ManifestTemplate, RenderedManifest};
pub use resource::{FieldError, Resource, ResourceList};
pub use wait::{wait_until, Deadline};

mod command;
mod configuration;
pub mod constants;
mod error;
mod expect;
mod http;
mod kubectl;
mod manifest;
mod resource;
mod wait;
