mod decoder;
mod directory;
mod error;
mod html;
#[cfg(windows)]
mod ldap;
mod names;
mod report;
mod snapshot;
mod utils;

use std::path::{Path, PathBuf};
use clap::{App, Arg, ArgGroup, ArgMatches};
use crate::directory::Directory;
use crate::error::ArlinksError;
use crate::names::NameResolver;
use crate::report::{FilterAxis, Report, ReportOptions};
use crate::snapshot::SnapshotDirectory;
use crate::utils::{absolute_path, copy_to_clipboard, default_export_path, get_client_locale, split_values};

const DEFAULT_PORT: u16 = 389;

enum Backend {
    Snapshot(SnapshotDirectory),
    #[cfg(windows)]
    Service(ldap::LdapDirectory),
}

impl Backend {
    fn directory(&self) -> &dyn Directory {
        match self {
            Self::Snapshot(s) => s,
            #[cfg(windows)]
            Self::Service(l) => l,
        }
    }

    fn close(self) {
        match self {
            Self::Snapshot(_) => (),
            #[cfg(windows)]
            Self::Service(mut l) => {
                if let Err(e) = l.disconnect() {
                    log::warn!("{}", e);
                }
            },
        }
    }
}

fn build_app() -> App<'static> {
    let filter_arg = |name: &'static str, long: &'static str, short: char, help: &'static str| {
        Arg::new(name)
            .help(help)
            .long(long)
            .short(short)
            .value_name("NAME[,NAME...]")
            .takes_value(true)
            .multiple_occurrences(true)
            .number_of_values(1)
    };
    App::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(filter_arg("trustee", "trustee", 't',
            "Report links delegating to these trustees (DN, SID, DOMAIN\\name or name)"))
        .arg(filter_arg("access_template", "access-template", 'a',
            "Report links of these access templates (DN or name)"))
        .arg(filter_arg("directory_object", "directory-object", 'o',
            "Report links applied on these directory objects (DN, SID, DOMAIN\\name or name)"))
        .group(
            ArgGroup::new("filter")
                .args(&["trustee", "access_template", "directory_object"])
                .required(true)
        )
        .arg(
            Arg::new("list_permissions")
                .help("Decode and list the permissions of each access template")
                .long("list-permissions")
                .short('p')
        ).arg(
            Arg::new("html")
                .help("Write an HTML report per input in the export path")
                .long("html")
        ).arg(
            Arg::new("export_path")
                .help("Directory where HTML reports are written (default: <temp>/ARLinks)")
                .long("export-path")
                .value_name("DIR")
                .number_of_values(1)
        ).arg(
            Arg::new("service")
                .help("Administration service to connect to")
                .long("service")
                .value_name("HOST[:PORT]")
                .number_of_values(1)
                .conflicts_with("snapshot")
        ).arg(
            Arg::new("use_client_locale")
                .help("Display names in the locale of this computer when available")
                .long("use-client-locale")
        ).arg(
            Arg::new("snapshot")
                .help("Read the directory from a JSON snapshot instead of the administration service")
                .long("snapshot")
                .value_name("FILE.json")
                .number_of_values(1)
        ).arg(
            Arg::new("csv")
                .help("Format output as CSV")
                .long("csv")
        ).arg(
            Arg::new("debug")
                .help("Verbose logging")
                .long("debug")
        )
}

/// Splits `host[:port]`, the port defaulting to the standard LDAP port.
fn parse_service(service: &str) -> Result<(String, u16), String> {
    match service.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(n) if n > 0 && !host.is_empty() => Ok((host.to_owned(), n)),
            _ => Err(format!("Unable to parse \"{}\" as host:port", service)),
        },
        None if !service.is_empty() => Ok((service.to_owned(), DEFAULT_PORT)),
        None => Err("Empty service name".to_owned()),
    }
}

fn selected_axis(args: &ArgMatches) -> Option<(FilterAxis, Vec<String>)> {
    [
        ("trustee", FilterAxis::Trustee),
        ("access_template", FilterAxis::AccessTemplate),
        ("directory_object", FilterAxis::DirectoryObject),
    ].iter()
        .find_map(|(name, axis)| args.values_of(*name).map(|v| (*axis, split_values(v))))
}

#[cfg(windows)]
fn open_service(service: Option<(String, u16)>) -> Result<Backend, ArlinksError> {
    let (server, port) = match &service {
        Some((host, port)) => (Some(host.as_str()), *port),
        None => (None, DEFAULT_PORT),
    };
    Ok(Backend::Service(ldap::LdapDirectory::connect(server, port)?))
}

#[cfg(not(windows))]
fn open_service(_service: Option<(String, u16)>) -> Result<Backend, ArlinksError> {
    Err(ArlinksError::UnsupportedPlatform("Connecting to the administration service"))
}

fn open_backend(args: &ArgMatches) -> Result<Backend, ArlinksError> {
    if let Some(path) = args.value_of("snapshot") {
        return Ok(Backend::Snapshot(SnapshotDirectory::load(Path::new(path))?));
    }
    let service = match args.value_of("service") {
        Some(s) => match parse_service(s) {
            Ok(s) => Some(s),
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(2);
            }
        },
        None => None,
    };
    open_service(service)
}

fn main() {
    let args = build_app().get_matches();

    if args.is_present("debug") {
        std::env::set_var("RUST_LOG", "arlinks=debug,winldap=debug,authz=debug");
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("arlinks=info")).init();

    let (axis, inputs) = match selected_axis(&args) {
        Some(s) => s,
        None => {
            eprintln!("One of --trustee, --access-template or --directory-object is required");
            std::process::exit(2);
        }
    };
    if inputs.is_empty() {
        eprintln!("No {} given", axis.label().to_lowercase());
        std::process::exit(2);
    }

    let html_dir = if args.is_present("html") {
        let dir = args.value_of("export_path").map(PathBuf::from).unwrap_or_else(default_export_path);
        match std::fs::create_dir_all(&dir).and_then(|_| absolute_path(&dir)) {
            Ok(dir) => Some(dir),
            Err(e) => {
                eprintln!(" [!] Unable to create export directory {} : {}", dir.display(), e);
                std::process::exit(1);
            }
        }
    } else {
        None
    };

    let backend = match open_backend(&args) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Unable to reach the directory: {}", e);
            std::process::exit(1);
        }
    };

    let client_locale = if args.is_present("use_client_locale") { get_client_locale() } else { None };
    let options = ReportOptions {
        axis,
        list_permissions: args.is_present("list_permissions"),
        html_dir,
        csv: args.is_present("csv"),
    };

    let summary = {
        let directory = backend.directory();
        let res = NameResolver::new(directory, client_locale)
            .and_then(|names| Report::new(directory, names, options, std::io::stdout()))
            .and_then(|mut report| {
                let summary = report.run(&inputs);
                report.finish()?;
                Ok(summary)
            });
        match res {
            Ok(s) => s,
            Err(e) => {
                eprintln!("An error occurred while reporting: {}", e);
                backend.close();
                std::process::exit(1);
            }
        }
    };
    backend.close();

    for path in &summary.html_files {
        println!("HTML report written to {}", path.display());
        copy_to_clipboard(path);
    }
    if !summary.failures.is_empty() {
        eprintln!(" [!] {} of {} input(s) could not be reported on:", summary.failures.len(), inputs.len());
        for (input, e) in &summary.failures {
            eprintln!("     {} : {}", input, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_env_log::test;

    #[test]
    fn exactly_one_filter_axis() {
        assert!(build_app().try_get_matches_from(vec!["arlinks", "-p"]).is_err());
        assert!(build_app().try_get_matches_from(vec!["arlinks", "-t", "Helpdesk", "-a", "User Management"]).is_err());
        let args = build_app().try_get_matches_from(vec!["arlinks", "-t", "Helpdesk,CORP\\jdoe", "--trustee", "S-1-5-32-544", "-p"]).unwrap();
        let (axis, inputs) = selected_axis(&args).unwrap();
        assert_eq!(axis, FilterAxis::Trustee);
        assert_eq!(inputs, vec!["Helpdesk", "CORP\\jdoe", "S-1-5-32-544"]);
        assert!(args.is_present("list_permissions"));
    }

    #[test]
    fn missing_filter_is_a_usage_error() {
        let err = build_app().try_get_matches_from(vec!["arlinks", "--html"]).unwrap_err();
        assert_eq!(err.kind(), clap::ErrorKind::MissingRequiredArgument);
        let err = build_app().try_get_matches_from(vec!["arlinks", "-o", "OU=Users", "--snapshot", "a.json", "--service", "ars01"]).unwrap_err();
        assert_eq!(err.kind(), clap::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn directory_object_dns_end_to_end() {
        let args = build_app().try_get_matches_from(vec![
            "arlinks",
            "-o", "OU=Users,DC=corp,DC=local",
            "--directory-object", "OU=Sales\\, EMEA,DC=corp,DC=local",
            "-o", "Helpdesk,CN=Server Admins,OU=Groups,DC=corp,DC=local",
        ]).unwrap();
        let (axis, inputs) = selected_axis(&args).unwrap();
        assert_eq!(axis, FilterAxis::DirectoryObject);
        assert_eq!(inputs, vec![
            "OU=Users,DC=corp,DC=local",
            "OU=Sales\\, EMEA,DC=corp,DC=local",
            "Helpdesk",
            "CN=Server Admins,OU=Groups,DC=corp,DC=local",
        ]);

        let dir = crate::snapshot::tests::fixture();
        let names = NameResolver::new(&dir, None).unwrap();
        let options = ReportOptions {
            axis,
            list_permissions: true,
            html_dir: None,
            csv: false,
        };
        let mut report = Report::new(&dir, names, options, Vec::new()).unwrap();
        let summary = report.run(&inputs);
        let out = String::from_utf8(report.finish().unwrap()).unwrap();
        assert!(summary.failures.is_empty(), "{:?}", summary.failures);
        assert!(out.contains("=== Directory Object: OU=Users,DC=corp,DC=local"));
        assert!(out.contains("=== Directory Object: OU=Sales\\, EMEA,DC=corp,DC=local"));
        assert!(out.contains("Trustee          : S-1-5-21-9-9-9-500"));
        assert!(out.contains("Create/Delete Computer Objects"));
        assert!(out.contains("=== Directory Object: CN=Server Admins,OU=Groups,DC=corp,DC=local"));
    }

    #[test]
    fn service_endpoint() {
        assert_eq!(parse_service("ars01.corp.local").unwrap(), ("ars01.corp.local".to_owned(), DEFAULT_PORT));
        assert_eq!(parse_service("ars01:50389").unwrap(), ("ars01".to_owned(), 50389));
        assert!(parse_service("ars01:0").is_err());
        assert!(parse_service(":389").is_err());
        assert!(parse_service("").is_err());
    }
}
