//! RPM spec file generation.
//!
//! The spec is a fixed text with `%{_gd_*}` placeholders. Substitution is a
//! plain substring replace; rpm's own macros (`%{name}`, `%{buildroot}`) are
//! left for rpmbuild, except `%{_datadir}` and `%{_bindir}` which are pinned
//! to the package prefix.

use crate::bundler::platform::aurora::layout::{BIN_DIR, DATA_DIR};
use crate::bundler::settings::Arch;

const SPEC_TEMPLATE: &str = r#"Name:       %{_gd_application_name}
# >> macros
%define __requires_exclude ^libfreetype\.so.*|.*libxkbcommon\.so.*$
%define __provides_exclude_from ^%{_datadir}/%{name}/lib/.*\.so.*$
%define debug_package %{nil}
# << macros
Summary:    %{_gd_launcher_name}
Version:    %{_gd_version}
Release:    %{_gd_release}
Group:      Game
License:    Proprietary
BuildArch:  %{_gd_architecture}
BuildRequires: patchelf

%define _topdir %{_gd_shared_path}%{_gd_export_path}

%description
%{_gd_description}

%prep
echo "Nothing to do here. Skip this step"

%build
echo "Nothing to do here. Skip this step"

%install
rm -rf %{buildroot}
mkdir -p "%{buildroot}"
mkdir -p "%{buildroot}%{_bindir}"
rm -fr "%{buildroot}%{_bindir}"
mv "%{_topdir}/BUILD%{_bindir}" "%{buildroot}%{_bindir}"
mv  "%{_topdir}/BUILD%{_datadir}" "%{buildroot}%{_datadir}"
mkdir -p "%{buildroot}/usr/share/applications"
[ -f "%{_topdir}/BUILD/usr/share/applications/%{name}.desktop" ] && mv -f "%{_topdir}/BUILD/usr/share/applications/%{name}.desktop" "%{buildroot}/usr/share/applications/%{name}.desktop"||echo "File moved already"
chmod 755 %{buildroot}/usr/share/icons/hicolor/*
chmod 755 %{buildroot}/usr/share/icons/hicolor/*/apps
chmod -R 755 %{buildroot}%{_datadir}/%{name}
patchelf --force-rpath --set-rpath /usr/share/%{name}/lib %{buildroot}%{_bindir}/%{name}
# dependencies
install -D %{_libdir}/libfreetype.so.* -t %{buildroot}%{_datadir}/%{name}/lib/
install -D %{_libdir}/libxkbcommon.so.* -t %{buildroot}%{_datadir}/%{name}/lib/

%files
%defattr(644,root,root,-)
%attr(755,root,root) %{_bindir}/%{name}
%{_datadir}/icons/hicolor/86x86/apps/%{name}.png
%{_datadir}/icons/hicolor/108x108/apps/%{name}.png
%{_datadir}/icons/hicolor/128x128/apps/%{name}.png
%{_datadir}/icons/hicolor/172x172/apps/%{name}.png
%attr(644,root,root) %{_datadir}/%{name}/%{name}.pck
%{_datadir}/%{name}/lib
%attr(644,root,root) %{_datadir}/applications/%{name}.desktop
%changelog
* %{_gd_date} Godot Game Engine
- application %{name} packed to RPM
#$changelog$"#;

/// Values substituted into the spec.
#[derive(Clone, Debug)]
pub struct SpecValues<'a> {
    /// Package name
    pub name: &'a str,
    /// Launcher label, used as the summary
    pub launcher_name: &'a str,
    /// Package version
    pub version: &'a str,
    /// Release number
    pub release: &'a str,
    /// Build architecture
    pub arch: Arch,
    /// Package description
    pub description: &'a str,
    /// Build engine location of the shared directory holding the staging root
    pub shared_path: &'a str,
    /// Staging root below `shared_path`, with a leading `/`
    pub export_path: &'a str,
    /// Changelog date, `%a %b %d %Y`
    pub date: &'a str,
}

/// Changelog date for today.
pub fn changelog_date() -> String {
    chrono::Local::now().format("%a %b %d %Y").to_string()
}

/// Renders the spec text.
pub fn render_spec(values: &SpecValues<'_>) -> String {
    SPEC_TEMPLATE
        .replace("%{_gd_application_name}", values.name)
        .replace("%{_gd_launcher_name}", values.launcher_name)
        .replace("%{_gd_version}", values.version)
        .replace("%{_gd_release}", values.release)
        .replace("%{_gd_architecture}", values.arch.token())
        .replace("%{_gd_description}", values.description)
        .replace("%{_gd_shared_path}", values.shared_path)
        .replace("%{_gd_export_path}", values.export_path)
        .replace("%{_gd_date}", values.date)
        .replace("%{_datadir}", DATA_DIR)
        .replace("%{_bindir}", BIN_DIR)
}
