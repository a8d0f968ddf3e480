// Author: Dustin Pilgrim
// License: MIT

use eventline as el;
use wayland_client::globals::Global;

use super::DisplayError;

pub const WL_SHM: &str = "wl_shm";
pub const WL_COMPOSITOR: &str = "wl_compositor";
pub const WL_OUTPUT: &str = "wl_output";
pub const LAYER_SHELL: &str = "zwlr_layer_shell_v1";

/// Version wanted for an interface, and the oldest one we can work with.
#[derive(Clone, Copy, Debug)]
pub struct VersionReq {
    pub interface: &'static str,
    pub max: u32,
    pub min: u32,
}

impl VersionReq {
    /// The version to bind given what the compositor advertises.
    pub fn negotiate(&self, advertised: u32) -> Result<u32, DisplayError> {
        if advertised < self.min {
            return Err(DisplayError::UnsupportedVersion {
                interface: self.interface,
                version: advertised,
                required: self.min,
            });
        }
        Ok(advertised.min(self.max))
    }
}

pub const SHM: VersionReq = VersionReq { interface: WL_SHM, max: 1, min: 1 };
// set_buffer_scale needs v3
pub const COMPOSITOR: VersionReq = VersionReq { interface: WL_COMPOSITOR, max: 4, min: 3 };
// scale events need v2, name events v4
pub const OUTPUT: VersionReq = VersionReq { interface: WL_OUTPUT, max: 4, min: 2 };
pub const LAYER: VersionReq = VersionReq { interface: LAYER_SHELL, max: 4, min: 1 };

/// A global as seen in the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Advertised {
    pub name: u32,
    pub interface: String,
    pub version: u32,
}

impl From<Global> for Advertised {
    fn from(g: Global) -> Self {
        Advertised {
            name: g.name,
            interface: g.interface,
            version: g.version,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bind {
    pub name: u32,
    pub version: u32,
}

/// What to bind, resolved from the registry contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindPlan {
    pub shm: Bind,
    pub compositor: Bind,
    pub layer_shell: Bind,
    pub outputs: Vec<Bind>,
}

fn single(globals: &[Advertised], req: VersionReq) -> Result<Bind, DisplayError> {
    let g = globals
        .iter()
        .find(|g| g.interface == req.interface)
        .ok_or(DisplayError::MissingGlobal(req.interface))?;

    Ok(Bind {
        name: g.name,
        version: req.negotiate(g.version)?,
    })
}

/// Every required global must be present (first one wins) and at least one usable output advertised.
///
/// Outputs below the version floor are skipped, the same way a late hotplugged one is.
pub fn plan(globals: &[Advertised]) -> Result<BindPlan, DisplayError> {
    let shm = single(globals, SHM)?;
    let compositor = single(globals, COMPOSITOR)?;
    let layer_shell = single(globals, LAYER)?;

    let mut outputs = Vec::new();
    for g in globals.iter().filter(|g| g.interface == WL_OUTPUT) {
        match OUTPUT.negotiate(g.version) {
            Ok(version) => outputs.push(Bind { name: g.name, version }),
            Err(e) => el::warn!("wayland.output.skipped global={} err={}", g.name, e),
        }
    }

    if outputs.is_empty() {
        return Err(DisplayError::NoOutputs);
    }

    Ok(BindPlan {
        shm,
        compositor,
        layer_shell,
        outputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g(name: u32, interface: &str, version: u32) -> Advertised {
        Advertised {
            name,
            interface: interface.into(),
            version,
        }
    }

    fn sway_like() -> Vec<Advertised> {
        vec![
            g(1, "wl_shm", 1),
            g(2, "wl_drm", 2),
            g(3, "wl_compositor", 6),
            g(4, "wl_subcompositor", 1),
            g(5, "zwlr_layer_shell_v1", 4),
            g(6, "xdg_wm_base", 5),
            g(7, "wl_output", 4),
        ]
    }

    #[test]
    fn full_registry_plans_every_bind() -> anyhow::Result<()> {
        let p = plan(&sway_like())?;

        assert_eq!(p.shm, Bind { name: 1, version: 1 });
        assert_eq!(p.compositor, Bind { name: 3, version: 4 });
        assert_eq!(p.layer_shell, Bind { name: 5, version: 4 });
        assert_eq!(p.outputs, vec![Bind { name: 7, version: 4 }]);
        Ok(())
    }

    #[test]
    fn missing_layer_shell_is_fatal() {
        let globals: Vec<_> = sway_like()
            .into_iter()
            .filter(|a| a.interface != LAYER_SHELL)
            .collect();

        assert!(matches!(
            plan(&globals),
            Err(DisplayError::MissingGlobal(LAYER_SHELL))
        ));
    }

    #[test]
    fn missing_shm_or_compositor_is_fatal() {
        for missing in [WL_SHM, WL_COMPOSITOR] {
            let globals: Vec<_> = sway_like()
                .into_iter()
                .filter(|a| a.interface != missing)
                .collect();
            match plan(&globals) {
                Err(DisplayError::MissingGlobal(name)) => assert_eq!(name, missing),
                other => panic!("expected missing {missing}, got {other:?}"),
            }
        }
    }

    #[test]
    fn no_outputs_is_fatal() {
        let globals: Vec<_> = sway_like()
            .into_iter()
            .filter(|a| a.interface != WL_OUTPUT)
            .collect();
        assert!(matches!(plan(&globals), Err(DisplayError::NoOutputs)));
    }

    #[test]
    fn versions_are_capped_and_floored() {
        let mut globals = sway_like();
        globals.push(g(8, "wl_output", 3));
        globals[4].version = 2;

        let p = plan(&globals).expect("plan");
        assert_eq!(p.layer_shell.version, 2);
        assert_eq!(p.outputs, vec![Bind { name: 7, version: 4 }, Bind { name: 8, version: 3 }]);

        globals[2].version = 2;
        assert!(matches!(
            plan(&globals),
            Err(DisplayError::UnsupportedVersion { interface: WL_COMPOSITOR, version: 2, required: 3 })
        ));
    }

    #[test]
    fn outdated_outputs_are_skipped_not_fatal() -> anyhow::Result<()> {
        let mut globals = sway_like();
        globals.push(g(9, "wl_output", 1));

        let p = plan(&globals)?;
        assert_eq!(p.outputs, vec![Bind { name: 7, version: 4 }]);

        let only_old: Vec<_> = globals.into_iter().filter(|a| a.name != 7).collect();
        assert!(matches!(plan(&only_old), Err(DisplayError::NoOutputs)));
        Ok(())
    }

    #[test]
    fn first_singleton_wins() -> anyhow::Result<()> {
        let mut globals = sway_like();
        globals.push(g(40, "wl_shm", 1));
        assert_eq!(plan(&globals)?.shm.name, 1);
        Ok(())
    }
}
