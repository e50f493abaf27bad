use crate::cli::VersionFormat;
use crate::version::VersionInfo;
use anyhow::Result;

pub fn format_version(info: &VersionInfo, format: Option<VersionFormat>) -> Result<String> {
    Ok(match format {
        None => format!("{}\n", info),
        Some(VersionFormat::Json) => format!("{}\n", serde_json::to_string_pretty(info)?),
        Some(VersionFormat::Yaml) => serde_yaml::to_string(info)?,
    })
}

pub fn handle_version(format: Option<VersionFormat>) -> Result<()> {
    print!("{}", format_version(&VersionInfo::current(), format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_formats() {
        let info = VersionInfo::current();
        assert!(format_version(&info, None).unwrap().starts_with("kubescan "));

        let json: serde_json::Value =
            serde_json::from_str(&format_version(&info, Some(VersionFormat::Json)).unwrap()).unwrap();
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));

        let yaml = format_version(&info, Some(VersionFormat::Yaml)).unwrap();
        assert!(yaml.contains("gitCommit:"));
    }
}
