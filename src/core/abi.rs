//! 合约ABI
//!
//! 路由、ERC20和包装原生资产合约只用到少量函数，直接以human-readable形式声明。

use ethers::abi::{parse_abi, Abi};
use ethers::contract::BaseContract;
use once_cell::sync::Lazy;

pub static ERC20_ABI: Lazy<Abi> = Lazy::new(|| {
    parse_abi(&[
        "function balanceOf(address owner) external view returns (uint256)",
        "function allowance(address owner, address spender) external view returns (uint256)",
        "function approve(address spender, uint256 amount) external returns (bool)",
    ])
    .expect("static erc20 abi")
});

pub static ROUTER_ABI: Lazy<Abi> = Lazy::new(|| {
    parse_abi(&[
        "function WETH() external view returns (address)",
        "function getAmountsOut(uint256 amountIn, address[] path) external view returns (uint256[])",
        "function swapExactETHForTokens(uint256 amountOutMin, address[] path, address to, uint256 deadline) external payable returns (uint256[])",
        "function swapExactTokensForETH(uint256 amountIn, uint256 amountOutMin, address[] path, address to, uint256 deadline) external returns (uint256[])",
        "function swapExactTokensForTokens(uint256 amountIn, uint256 amountOutMin, address[] path, address to, uint256 deadline) external returns (uint256[])",
        "function addLiquidityETH(address token, uint256 amountTokenDesired, uint256 amountTokenMin, uint256 amountETHMin, address to, uint256 deadline) external payable returns (uint256, uint256, uint256)",
    ])
    .expect("static router abi")
});

pub static WRAPPED_NATIVE_ABI: Lazy<Abi> = Lazy::new(|| {
    parse_abi(&["function deposit() external payable"])
    .expect("static wrapped native abi")
});

pub static ERC20: Lazy<BaseContract> = Lazy::new(|| BaseContract::from(ERC20_ABI.clone()));
pub static ROUTER: Lazy<BaseContract> = Lazy::new(|| BaseContract::from(ROUTER_ABI.clone()));
pub static WRAPPED_NATIVE: Lazy<BaseContract> =
    Lazy::new(|| BaseContract::from(WRAPPED_NATIVE_ABI.clone()));
