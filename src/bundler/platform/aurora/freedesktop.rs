//! Launcher descriptor (`.desktop`) generation.

use crate::bundler::platform::aurora::layout::{BIN_DIR, DATA_DIR};
use crate::bundler::settings::{ExportSettings, Permission};

const DESKTOP_TEMPLATE: &str = "[Desktop Entry]
Type=Application
X-Nemo-Application-Type=no-invoker
Icon=%{name}
Exec=%{name} --main-pack %{_datadir}/%{name}/%{name}.pck
Name=%{_gd_launcher_name}
Name[en]=%{_gd_launcher_name}
Categories=Game";

const SAILJAIL_TEMPLATE: &str = "
[X-Application]
Permissions=%{permissions}
OrganizationName=%{organization}
ApplicationName=%{appname}
";

/// Sandbox section of the descriptor.
#[derive(Clone, Debug)]
pub struct SandboxSection<'a> {
    /// Reverse-domain organization
    pub organization: &'a str,
    /// `;`-joined permission list
    pub permissions: String,
}

/// Joins permissions: mandatory ones first, then the optional ones in the
/// given (declaration) order. Repeats are dropped.
pub fn join_permissions<'p>(
    mandatory: impl IntoIterator<Item = &'p str>,
    optional: impl IntoIterator<Item = &'p str>,
) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for permission in mandatory.into_iter().chain(optional) {
        if !seen.contains(&permission) {
            seen.push(permission);
        }
    }
    seen.join(";")
}

/// Permission list for the configured application.
pub fn permissions_for(settings: &ExportSettings) -> String {
    join_permissions(
        Permission::MANDATORY.iter().map(Permission::as_str),
        Permission::DECLARED
            .iter()
            .filter(|p| settings.permission_enabled(**p))
            .map(Permission::as_str),
    )
}

/// Application name shown to sailjail: the package name without the
/// `harbour-` and `<organization>.` prefixes.
pub fn sandbox_app_name(package_name: &str, organization: &str) -> String {
    package_name
        .replace("harbour-", "")
        .replace(&format!("{}.", organization), "")
}

/// Renders the descriptor.
pub fn render_desktop(name: &str, launcher_name: &str, sandbox: Option<&SandboxSection<'_>>) -> String {
    let mut text = DESKTOP_TEMPLATE
        .replace("%{_gd_launcher_name}", launcher_name)
        .replace("%{name}", name)
        .replace("%{_datadir}", DATA_DIR)
        .replace("%{_bindir}", BIN_DIR);

    if let Some(sandbox) = sandbox {
        text.push_str(&SAILJAIL_TEMPLATE.replace("%{name}", name));
        text = text
            .replace("%{organization}", sandbox.organization)
            .replace("%{appname}", &sandbox_app_name(name, sandbox.organization))
            .replace("%{permissions}", &sandbox.permissions);
    }
    text
}
