// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Just enough OpenCL C scanning to discover kernel signatures.

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KernelSig {
    pub name: String,
    pub args: Vec<String>,
}

/// Find `kernel void name(args)` / `__kernel void name(args)` declarations.
pub(crate) fn scan_kernels(source: &str) -> Vec<KernelSig> {
    let mut kernels = Vec::new();
    for (idx, keyword) in source.match_indices("kernel") {
        let head = &source[..idx];
        let standalone = match head.chars().next_back() {
            None => true,
            Some('_') => head.ends_with("__") && !head[..head.len() - 2].ends_with(is_ident_char),
            Some(c) => !is_ident_char(c),
        };
        if !standalone {
            continue;
        }
        let tail = source[idx + keyword.len()..].trim_start();
        let Some(tail) = tail.strip_prefix("void") else {
            continue;
        };
        let Some(open) = tail.find('(') else {
            continue;
        };
        let name = tail[..open].trim();
        if name.is_empty() || !name.chars().all(is_ident_char) {
            continue;
        }
        let Some(close) = tail[open..].find(')') else {
            continue;
        };
        let args = tail[open + 1..open + close]
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty() && *p != "void")
            .map(|p| {
                p.rsplit(|c: char| c.is_whitespace() || c == '*')
                    .next()
                    .unwrap_or(p)
                    .to_string()
            })
            .collect();
        kernels.push(KernelSig {
            name: name.to_string(),
            args,
        });
    }
    kernels
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// First `#error` directive, if the source carries one.
pub(crate) fn error_directive(source: &str) -> Option<&str> {
    source
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("#error"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_both_spellings() {
        let src = "__kernel void add(__global float *a, __global const float* b, int n) {}\n\
                   kernel void clear(global int *out) {}";
        let kernels = scan_kernels(src);
        assert_eq!(kernels.len(), 2);
        assert_eq!(kernels[0].name, "add");
        assert_eq!(kernels[0].args, vec!["a", "b", "n"]);
        assert_eq!(kernels[1].name, "clear");
        assert_eq!(kernels[1].args, vec!["out"]);
    }

    #[test]
    fn ignores_identifiers_containing_kernel() {
        let src = "void my_kernel(int x) {}\nint kernelCount = 0;";
        assert!(scan_kernels(src).is_empty());
    }

    #[test]
    fn void_parameter_list_has_no_args() {
        let kernels = scan_kernels("kernel void tick(void) {}");
        assert_eq!(kernels[0].args, Vec::<String>::new());
    }

    #[test]
    fn error_directive_is_detected() {
        assert_eq!(error_directive("int x;\n  #error nope\n"), Some("#error nope"));
        assert_eq!(error_directive("kernel void k() {}"), None);
    }
}
