//! 路径解析
//!
//! 候选路径按固定顺序报价，第一个返回非空、非零报价的路径胜出，
//! 不比较不同路径的价格。

use ethers::types::{Address, U256};
use tracing::debug;

use crate::core::chain::ChainClient;
use crate::core::types::{BotError, Result, Route, Token, TokenBook};
use crate::strategy::config::RoutePreference;
use crate::utils::RetryPolicy;

pub struct RouteResolver {
    router: Address,
    wrapped_native: Address,
    preference: RoutePreference,
    retry: RetryPolicy,
}

impl RouteResolver {
    pub fn new(
        router: Address,
        wrapped_native: Address,
        preference: RoutePreference,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            router,
            wrapped_native,
            preference,
            retry,
        }
    }

    /// 候选路径：直连，以及两端都不是包装原生资产时经其中转的路径
    pub fn candidates(&self, src: Address, dst: Address) -> Vec<Vec<Address>> {
        let direct = vec![src, dst];
        if src == self.wrapped_native || dst == self.wrapped_native {
            return vec![direct];
        }

        let routed = vec![src, self.wrapped_native, dst];
        match self.preference {
            RoutePreference::DirectFirst => vec![direct, routed],
            RoutePreference::RoutedFirst => vec![routed, direct],
        }
    }

    /// 解析 `src → dst` 的可用路径
    ///
    /// 原生资产以包装原生资产地址参与路由。映射后两端相同（包括原生资产换原生资产，
    /// 以及原生资产与包装原生资产互换）直接拒绝，包装操作由调用方处理。
    /// `mass_mode` 下报价失败不重试，直接尝试下一条候选路径。
    pub async fn resolve(
        &self,
        client: &dyn ChainClient,
        tokens: &TokenBook,
        src: &Token,
        dst: &Token,
        amount_in: U256,
        mass_mode: bool,
    ) -> Result<Route> {
        if src.is_native() && dst.is_native() {
            return Err(BotError::InvalidOperation(
                "cannot swap the native asset to itself".to_string(),
            ));
        }

        let src_address = tokens.route_address(src);
        let dst_address = tokens.route_address(dst);
        if src_address == dst_address {
            return Err(BotError::InvalidOperation(format!(
                "{} and {} resolve to the same contract",
                src.symbol, dst.symbol
            )));
        }
        if amount_in.is_zero() {
            return Err(BotError::InvalidOperation("amount in is zero".to_string()));
        }

        for path in self.candidates(src_address, dst_address) {
            match self.quote(client, amount_in, &path, mass_mode).await {
                Ok(amount_out) => {
                    debug!(?path, %amount_out, "Route resolved");
                    return Ok(Route { path, amount_out });
                }
                Err(error) => {
                    debug!(?path, %error, "Candidate path rejected");
                }
            }
        }

        Err(BotError::NoRoute {
            src: src_address,
            dst: dst_address,
        })
    }

    /// 对单条路径报价，返回最终输出数量。空结果或零输出视为无效。
    pub async fn quote(
        &self,
        client: &dyn ChainClient,
        amount_in: U256,
        path: &[Address],
        mass_mode: bool,
    ) -> Result<U256> {
        let policy = if mass_mode { RetryPolicy::once() } else { self.retry };
        let amounts = policy
            .run("quote", |_| client.amounts_out(self.router, amount_in, path.to_vec()))
            .await?;

        match amounts.last() {
            Some(amount_out) if !amount_out.is_zero() => Ok(*amount_out),
            _ => Err(BotError::NoRoute {
                src: path.first().copied().unwrap_or_default(),
                dst: path.last().copied().unwrap_or_default(),
            }),
        }
    }
}
