//! 页面导航与用户提示
//!
//! 登录/注册成功后以及会话过期时需要把用户带到目标页面。宿主环境的
//! 首选导航原语可能被拒绝（比如目标是保留的 tabBar 根页面），因此按
//! 固定优先级依次尝试：整栈重置 → 切换标签 → 替换当前页。每种只试
//! 一次，全部失败只记日志，不向调用方抛错——会话本身是有效的，失败
//! 的只是一次过场。

use crate::error::Result;
use tracing::{debug, warn};

/// 页面路由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Home,
    Result,
    History,
    Profile,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/pages/login/login",
            Route::Home => "/pages/index/index",
            Route::Result => "/pages/result/result",
            Route::History => "/pages/history/history",
            Route::Profile => "/pages/profile/profile",
        }
    }
}

/// 宿主外壳：提示与导航原语
#[cfg_attr(test, mockall::automock)]
pub trait Shell: Send + Sync {
    /// 非阻塞提示
    fn toast(&self, message: &str);
    /// 重置整个页面栈后打开目标页
    fn relaunch(&self, route: Route) -> Result<()>;
    /// 切换到目标标签页
    fn switch_tab(&self, route: Route) -> Result<()>;
    /// 用目标页替换当前页
    fn redirect(&self, route: Route) -> Result<()>;
}

/// 按固定顺序尝试导航原语，首次成功即停，穷尽也不报错
pub fn navigate_with_fallback(shell: &dyn Shell, route: Route) {
    type Attempt<'a> = (&'static str, Box<dyn Fn() -> Result<()> + 'a>);
    let attempts: [Attempt<'_>; 3] = [
        ("relaunch", Box::new(move || shell.relaunch(route))),
        ("switch_tab", Box::new(move || shell.switch_tab(route))),
        ("redirect", Box::new(move || shell.redirect(route))),
    ];

    for (name, attempt) in attempts {
        match attempt() {
            Ok(()) => {
                debug!(primitive = name, route = route.path(), "navigation ok");
                return;
            }
            Err(e) => {
                debug!(primitive = name, route = route.path(), error = %e, "navigation attempt failed");
            }
        }
    }
    warn!(route = route.path(), "all navigation attempts failed");
}

/// CLI 外壳：提示打到标准输出，导航原语恒成功（只记日志）
pub struct ConsoleShell;

impl Shell for ConsoleShell {
    fn toast(&self, message: &str) {
        println!("{}", message);
    }

    fn relaunch(&self, route: Route) -> Result<()> {
        debug!(route = route.path(), "relaunch");
        Ok(())
    }

    fn switch_tab(&self, route: Route) -> Result<()> {
        debug!(route = route.path(), "switch_tab");
        Ok(())
    }

    fn redirect(&self, route: Route) -> Result<()> {
        debug!(route = route.path(), "redirect");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn refused() -> Result<()> {
        Err(Error::InvalidResponse("can not switch to tabbar page".to_string()))
    }

    #[test]
    fn test_first_primitive_success_stops_chain() {
        let mut shell = MockShell::new();
        shell.expect_relaunch().times(1).returning(|_| Ok(()));
        shell.expect_switch_tab().times(0);
        shell.expect_redirect().times(0);

        navigate_with_fallback(&shell, Route::Home);
    }

    #[test]
    fn test_second_primitive_success_skips_third() {
        let mut shell = MockShell::new();
        shell.expect_relaunch().times(1).returning(|_| refused());
        shell.expect_switch_tab().times(1).returning(|_| Ok(()));
        shell.expect_redirect().times(0);

        navigate_with_fallback(&shell, Route::Home);
    }

    #[test]
    fn test_exhaustion_does_not_panic_or_error() {
        let mut shell = MockShell::new();
        shell.expect_relaunch().times(1).returning(|_| refused());
        shell.expect_switch_tab().times(1).returning(|_| refused());
        shell.expect_redirect().times(1).returning(|_| refused());

        // 三种原语各试一次，穷尽后静默返回
        navigate_with_fallback(&shell, Route::Home);
    }
}
