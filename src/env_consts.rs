//! Environment constants and id escaping
//!
//! Directory names such as `%ProgramFiles%\My Company` use `%Token%` place
//! holders for the Windows Installer special folders. This module maps them to
//! the folder ids WiX expects and turns arbitrary names into legal WiX ids.

/// `%Token%` to special folder id, in lookup order
pub const ENVIRONMENT_CONSTANTS: &[(&str, &str)] = &[
    ("%AdminToolsFolder%", "AdminToolsFolder"),
    ("%AppDataFolder%", "AppDataFolder"),
    ("%CommonAppDataFolder%", "CommonAppDataFolder"),
    ("%CommonFiles64Folder%", "CommonFiles64Folder"),
    ("%CommonFilesFolder%", "CommonFilesFolder"),
    ("%DesktopFolder%", "DesktopFolder"),
    ("%FavoritesFolder%", "FavoritesFolder"),
    ("%FontsFolder%", "FontsFolder"),
    ("%LocalAppDataFolder%", "LocalAppDataFolder"),
    ("%MyPicturesFolder%", "MyPicturesFolder"),
    ("%PersonalFolder%", "PersonalFolder"),
    ("%ProgramFiles64Folder%", "ProgramFiles64Folder"),
    ("%ProgramFilesFolder%", "ProgramFilesFolder"),
    ("%ProgramMenuFolder%", "ProgramMenuFolder"),
    ("%SendToFolder%", "SendToFolder"),
    ("%StartMenuFolder%", "StartMenuFolder"),
    ("%StartupFolder%", "StartupFolder"),
    ("%System16Folder%", "System16Folder"),
    ("%System64Folder%", "System64Folder"),
    ("%SystemFolder%", "SystemFolder"),
    ("%TempFolder%", "TempFolder"),
    ("%TemplateFolder%", "TemplateFolder"),
    ("%WindowsFolder%", "WindowsFolder"),
    ("%WindowsVolume%", "WindowsVolume"),
    ("%AdminTools%", "AdminToolsFolder"),
    ("%AppData%", "AppDataFolder"),
    ("%CommonAppData%", "CommonAppDataFolder"),
    ("%CommonFiles64%", "CommonFiles64Folder"),
    ("%CommonFiles%", "CommonFilesFolder"),
    ("%Desktop%", "DesktopFolder"),
    ("%Favorites%", "FavoritesFolder"),
    ("%Fonts%", "FontsFolder"),
    ("%LocalAppData%", "LocalAppDataFolder"),
    ("%MyPictures%", "MyPicturesFolder"),
    ("%Personal%", "PersonalFolder"),
    ("%ProgramFiles64%", "ProgramFiles64Folder"),
    ("%ProgramFiles%", "ProgramFilesFolder"),
    ("%ProgramMenu%", "ProgramMenuFolder"),
    ("%SendTo%", "SendToFolder"),
    ("%StartMenu%", "StartMenuFolder"),
    ("%Startup%", "StartupFolder"),
    ("%System16%", "System16Folder"),
    ("%System64%", "System64Folder"),
    ("%System%", "SystemFolder"),
    ("%Temp%", "TempFolder"),
    ("%Template%", "TemplateFolder"),
    ("%Windows%", "WindowsFolder"),
];

/// 32-bit folder token to its 64-bit counterpart
pub const FOLDERS_64_MAPPING: &[(&str, &str)] = &[
    ("%ProgramFilesFolder%", "%ProgramFiles64Folder%"),
    ("%ProgramFiles%", "%ProgramFiles64%"),
    ("%CommonFilesFolder%", "%CommonFiles64Folder%"),
    ("%SystemFolder%", "%System64Folder%"),
    ("%CommonFiles%", "%CommonFiles64%"),
    ("%System%", "%System64%"),
];

/// Folder ids that count as "Program Files" when looking for a permanent
/// parent directory.
pub const PROGRAM_FILES_IDS: &[&str] = &["ProgramFilesFolder", "ProgramFiles64Folder"];

/// Special folder id for a directory name given as `%Token%`, folder id or
/// `[FolderId]`.
pub fn special_folder_id(name: &str) -> Option<&'static str> {
    let bare = name.trim_start_matches('[').trim_end_matches(']');
    ENVIRONMENT_CONSTANTS
        .iter()
        .find(|(token, id)| *token == name || *id == bare)
        .map(|(_, id)| *id)
}

/// Whether `value` names a special folder
pub fn is_wix_constant(value: &str) -> bool {
    special_folder_id(value).is_some()
}

/// Whether `s` is shaped like a single `%Token%`
pub fn is_env_token(s: &str) -> bool {
    s.len() > 2 && s.starts_with('%') && s.ends_with('%') && !s[1..s.len() - 1].contains('%')
}

/// Replace every `%Token%` (and `[FolderId]`) with the bare folder id
pub fn expand_wix_env_consts(path: &str) -> String {
    let mut result = path.to_string();
    for (token, id) in ENVIRONMENT_CONSTANTS {
        result = result
            .replace(token, id)
            .replace(&format!("[{}]", id), id);
    }
    result
}

/// Keep `._0-9a-zA-Z`, replace everything else by its lowercase hex code.
///
/// With `fix_start_digit` the result gets a `_` prefix when it would start
/// with a digit or a dot.
pub fn escape_illegal_characters(data: &str, fix_start_digit: bool) -> String {
    let mut escaped = String::with_capacity(data.len());
    for ch in data.chars() {
        if ch.is_ascii_alphanumeric() || ch == '.' || ch == '_' {
            escaped.push(ch);
        } else {
            escaped.push_str(&format!("{:x}", ch as u32));
        }
    }

    let needs_prefix = escaped
        .chars()
        .next()
        .map(|c| c.is_ascii_digit() || c == '.')
        .unwrap_or(false);

    if fix_start_digit && needs_prefix {
        format!("_{}", escaped)
    } else {
        escaped
    }
}

/// Turn a name or path into an id fragment
pub fn expand(path: &str, fix_start_digit: bool) -> String {
    let result = escape_illegal_characters(
        &expand_wix_env_consts(path).replace('\\', "."),
        fix_start_digit,
    );

    match result.strip_prefix('.') {
        Some(rest) => format!("_{}", rest),
        None => result,
    }
}

/// Normalize a path or command line to WiX formatted-string syntax.
///
/// `%ProgramFiles%\app.exe` and `%ProgramFilesFolder%app.exe` both become
/// `[ProgramFilesFolder]app.exe`; other `%PROP%` pairs become `[PROP]`.
pub fn normalize_wix_string(path: &str) -> String {
    let mut result = path.to_string();
    for (token, id) in ENVIRONMENT_CONSTANTS {
        let short = &token[1..token.len() - 1];
        result = result
            .replace(token, &format!("%{}%", id))
            .replace(&format!("[{}]", short), &format!("[{}]", id));
    }

    let result = result.replace("%\\", "%");

    let mut left = true;
    result
        .chars()
        .map(|c| {
            if c == '%' {
                let bracket = if left { '[' } else { ']' };
                left = !left;
                bracket
            } else {
                c
            }
        })
        .collect()
}

/// Map known `%Token%` constants of a command line to `[FolderId]`.
///
/// Folder properties end with a separator, so one directly following the
/// token is dropped. Any other `%` is left alone.
pub fn expand_command_path(path: &str) -> String {
    let mut result = path.to_string();
    for (token, id) in ENVIRONMENT_CONSTANTS {
        let folder = format!("[{}]", id);
        result = result
            .replace(&format!("{}\\", token), &folder)
            .replace(token, &folder);
    }
    result
}

/// Swap 32-bit folder tokens for the 64-bit ones
pub fn map_64_dirs(path: &str) -> String {
    let mut result = path.to_string();
    for (from, to) in FOLDERS_64_MAPPING {
        result = result.replace(from, to);
    }
    result
}

/// Last path segment, for both `\` and `/` separators
pub fn path_file_name(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

/// File name without its last extension
pub fn path_file_stem(path: &str) -> &str {
    let name = path_file_name(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(pos) => &name[..pos],
    }
}

/// Rooted Windows or Unix path (`C:\x`, `\\server\x`, `/x`)
pub fn is_path_rooted(path: &str) -> bool {
    let bytes = path.as_bytes();
    path.starts_with('\\')
        || path.starts_with('/')
        || (bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_wix_env_consts() {
        assert_eq!(
            expand_wix_env_consts(r"%ProgramFiles%\My Company"),
            r"ProgramFilesFolder\My Company"
        );
        assert_eq!(expand_wix_env_consts("[DesktopFolder]"), "DesktopFolder");
        assert_eq!(expand_wix_env_consts("%NotAFolder%"), "%NotAFolder%");
    }

    #[test]
    fn test_escape_illegal_characters() {
        assert_eq!(escape_illegal_characters("My Product", true), "My20Product");
        assert_eq!(escape_illegal_characters("app-1.exe", true), "app2d1.exe");
        assert_eq!(escape_illegal_characters("1st", true), "_1st");
        assert_eq!(escape_illegal_characters("1st", false), "1st");
        assert_eq!(escape_illegal_characters(".cfg", true), "_.cfg");
    }

    #[test]
    fn test_expand() {
        assert_eq!(
            expand(r"%ProgramFiles%\My Company\My Product", true),
            "ProgramFilesFolder.My20Company.My20Product"
        );
        assert_eq!(expand(".hidden", false), "_hidden");
        assert_eq!(expand("Docs", true), "Docs");
    }

    #[test]
    fn test_normalize_wix_string() {
        assert_eq!(
            normalize_wix_string(r"%INSTALLDIR%\my_app.exe"),
            "[INSTALLDIR]my_app.exe"
        );
        assert_eq!(
            normalize_wix_string("%INSTALLDIR%my_app.exe"),
            "[INSTALLDIR]my_app.exe"
        );
        assert_eq!(
            normalize_wix_string("[INSTALLDIR]my_app.exe"),
            "[INSTALLDIR]my_app.exe"
        );
        assert_eq!(
            normalize_wix_string(r"%System64Folder%\msiexec.exe"),
            "[System64Folder]msiexec.exe"
        );
        assert_eq!(
            normalize_wix_string(r"%ProgramFiles%\Tool\tool.exe"),
            r"[ProgramFilesFolder]Tool\tool.exe"
        );
        assert_eq!(normalize_wix_string("[System]cmd.exe"), "[SystemFolder]cmd.exe");
    }

    #[test]
    fn test_expand_command_path() {
        assert_eq!(
            expand_command_path(r"%SystemFolder%\cmd.exe"),
            "[SystemFolder]cmd.exe"
        );
        assert_eq!(
            expand_command_path("/c copy %ProgramFiles%Acme %PATH%"),
            "/c copy [ProgramFilesFolder]Acme %PATH%"
        );
        assert_eq!(expand_command_path("/ratio 50%"), "/ratio 50%");
        assert_eq!(
            expand_command_path("/home %USERPROFILE%"),
            "/home %USERPROFILE%"
        );
        assert_eq!(
            expand_command_path("[INSTALLDIR]tool.exe"),
            "[INSTALLDIR]tool.exe"
        );
    }

    #[test]
    fn test_map_64_dirs() {
        assert_eq!(map_64_dirs(r"%ProgramFiles%\Acme"), r"%ProgramFiles64%\Acme");
        assert_eq!(
            map_64_dirs(r"%ProgramFilesFolder%\Acme"),
            r"%ProgramFiles64Folder%\Acme"
        );
        assert_eq!(map_64_dirs("%System%"), "%System64%");
        assert_eq!(map_64_dirs("%AppData%"), "%AppData%");
    }

    #[test]
    fn test_special_folder_id() {
        assert_eq!(special_folder_id("%ProgramFiles%"), Some("ProgramFilesFolder"));
        assert_eq!(special_folder_id("DesktopFolder"), Some("DesktopFolder"));
        assert_eq!(special_folder_id("[TempFolder]"), Some("TempFolder"));
        assert_eq!(special_folder_id("My Product"), None);
        assert!(is_wix_constant("%Desktop%"));
        assert!(!is_wix_constant("%Unknown%"));
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(path_file_name(r"bin\Release\MyApp.exe"), "MyApp.exe");
        assert_eq!(path_file_name("docs/readme.txt"), "readme.txt");
        assert_eq!(path_file_stem(r"bin\MyApp.exe"), "MyApp");
        assert_eq!(path_file_stem(".gitignore"), ".gitignore");
        assert!(is_path_rooted(r"C:\Tools"));
        assert!(is_path_rooted(r"\\server\share"));
        assert!(!is_path_rooted(r"%ProgramFiles%\Acme"));
        assert!(is_env_token("%ProgramFiles%"));
        assert!(!is_env_token(r"%ProgramFiles%\Acme"));
    }
}
