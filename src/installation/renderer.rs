// ABOUTME: Renders a release job's templates into an installed job directory.
// ABOUTME: Templates are copied as-is; bin/ files are made executable.

use super::error::InstallError;
use crate::config::Properties;
use crate::release::ReleaseJob;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::debug;

pub trait JobRenderer: Send + Sync {
    /// Render every template of `job` into `dest`, keyed by template destination.
    fn render(
        &self,
        job: &ReleaseJob,
        properties: &Properties,
        dest: &Path,
    ) -> Result<(), InstallError>;
}

/// Copies template sources verbatim. Job properties are written next to
/// them as `properties.json` for CPIs that read configuration at runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyJobRenderer;

impl JobRenderer for CopyJobRenderer {
    fn render(
        &self,
        job: &ReleaseJob,
        properties: &Properties,
        dest: &Path,
    ) -> Result<(), InstallError> {
        let render_err = |template: &str| {
            let job = job.name.clone();
            let template = template.to_string();
            move |source| InstallError::Render {
                job,
                template,
                source,
            }
        };

        fs::create_dir_all(dest)?;
        for (src, target) in &job.templates {
            let from = job.extracted_path.join("templates").join(src);
            let to = dest.join(target);
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent).map_err(render_err(src))?;
            }
            fs::copy(&from, &to).map_err(render_err(src))?;
            if Path::new(target).starts_with("bin") {
                fs::set_permissions(&to, fs::Permissions::from_mode(0o755))
                    .map_err(render_err(src))?;
            }
            debug!(job = %job.name, template = %src, dest = %to.display(), "rendered template");
        }

        let properties = serde_json::to_vec_pretty(properties)
            .map_err(|e| render_err("properties.json")(std::io::Error::other(e)))?;
        fs::write(dest.join("properties.json"), properties)
            .map_err(render_err("properties.json"))?;
        Ok(())
    }
}
