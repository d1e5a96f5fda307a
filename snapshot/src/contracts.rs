//! Contract interfaces read by the snapshot.
//!
//! Only the view functions actually called are declared.

use alloy_sol_types::sol;

sol! {
    /// Aave v3 Pool.
    interface IPool {
        function ADDRESSES_PROVIDER() external view returns (address);

        function getReservesList() external view returns (address[] memory);

        function getReserveData(address asset) external view returns (
            uint256 configuration,
            uint128 liquidityIndex,
            uint128 currentLiquidityRate,
            uint128 variableBorrowIndex,
            uint128 currentVariableBorrowRate,
            uint128 currentStableBorrowRate,
            uint40 lastUpdateTimestamp,
            uint16 id,
            address aTokenAddress,
            address stableDebtTokenAddress,
            address variableDebtTokenAddress,
            address interestRateStrategyAddress,
            uint128 accruedToTreasury,
            uint128 unbacked,
            uint128 isolationModeTotalDebt
        );

        function getUserAccountData(address user) external view returns (
            uint256 totalCollateralBase,
            uint256 totalDebtBase,
            uint256 availableBorrowsBase,
            uint256 currentLiquidationThreshold,
            uint256 ltv,
            uint256 healthFactor
        );
    }
}

sol! {
    interface IPoolAddressesProvider {
        function getPriceOracle() external view returns (address);
        function getPoolConfigurator() external view returns (address);
    }
}

sol! {
    /// Aave oracle, prices are in base currency units.
    interface IAaveOracle {
        function BASE_CURRENCY_UNIT() external view returns (uint256);
        function getAssetPrice(address asset) external view returns (uint256);
        function getSourceOfAsset(address asset) external view returns (address);
    }
}

sol! {
    interface IPoolConfigurator {
        function getReserveCaps(address asset) external view returns (uint256 borrowCap, uint256 supplyCap);
    }
}

sol! {
    interface IERC20Metadata {
        function symbol() external view returns (string memory);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
        function totalSupply() external view returns (uint256);
    }
}

sol! {
    /// Chainlink compatible price feed.
    interface IAggregatorV3 {
        function latestRoundData() external view returns (
            uint80 roundId,
            int256 answer,
            uint256 startedAt,
            uint256 updatedAt,
            uint80 answeredInRound
        );
    }
}

sol! {
    interface IMulticall3 {
        struct Call {
            address target;
            bytes callData;
        }

        struct CallResult {
            bool success;
            bytes returnData;
        }

        function tryAggregate(bool requireSuccess, Call[] calldata calls)
            external
            payable
            returns (CallResult[] memory returnData);
    }
}
